// Peephole Optimizer (spec.md §4.3). Ten registered passes, each a local
// rewrite over the instruction list; the driver tries them in registration
// order and restarts from the first pass as soon as any one of them
// reports progress, continuing until a full pass over the list finds
// nothing left to do.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::codegen::Program;
use crate::x86::{Instruction, Operand, OperandKind};

type Pass = fn(&mut Program) -> bool;

const PASSES: &[Pass] = &[
    push_then_pop,
    redundant_mov,
    remove_nops,
    jump_right_after,
    unused_label,
    label_right_after,
    mov_pop_to_leave,
    zero_add_sub,
    move_ab_ba,
    move_dead_writes,
];

/// Run every pass to a fixed point. Mirrors `any(pass(prog) for pass in
/// passes)`'s short-circuit: within one sweep, the scan stops at the first
/// pass that reports progress and restarts from the top, rather than
/// running all ten passes every sweep.
pub fn optimize(program: &mut Program) {
    let mut pass_count: u64 = 0;
    loop {
        let progressed = PASSES.iter().any(|pass| pass(program));
        if !progressed {
            break;
        }
        pass_count += 1;
        if pass_count % 1000 == 0 {
            warn!("{pass_count} passes have been run, this may be an infinite loop");
        }
    }
    debug!("optimization finished after {pass_count} passes");
}

fn push_then_pop(program: &mut Program) -> bool {
    let snapshot = program.instrs.clone();
    let mut found = false;
    for i in 0..snapshot.len().saturating_sub(1) {
        if let (Instruction::Push(src), Instruction::Pop(dst)) = (&snapshot[i], &snapshot[i + 1]) {
            let new = Instruction::Mov { dst: dst.clone(), src: src.clone() };
            debug!("{}; {} => {new}", snapshot[i], snapshot[i + 1]);
            program.instrs[i] = new;
            program.instrs[i + 1] = Instruction::Nop;
            found = true;
        }
    }
    found
}

fn redundant_mov(program: &mut Program) -> bool {
    let mut found = false;
    for i in 0..program.instrs.len() {
        if let Instruction::Mov { dst, src } = &program.instrs[i] {
            if dst == src {
                debug!("{} => nop", program.instrs[i]);
                program.instrs[i] = Instruction::Nop;
                found = true;
            }
        }
    }
    found
}

fn remove_nops(program: &mut Program) -> bool {
    let before = program.instrs.len();
    program.instrs.retain(|instr| !matches!(instr, Instruction::Nop));
    program.instrs.len() != before
}

fn jump_right_after(program: &mut Program) -> bool {
    let snapshot = program.instrs.clone();
    let mut found = false;
    for i in 0..snapshot.len().saturating_sub(1) {
        if let (Instruction::Jmp(dst), Instruction::Label(l)) = (&snapshot[i], &snapshot[i + 1]) {
            if dst == l {
                debug!("{}; {} => nop; {}", snapshot[i], snapshot[i + 1], snapshot[i + 1]);
                program.instrs[i] = Instruction::Nop;
                found = true;
            }
        }
    }
    found
}

fn unused_label(program: &mut Program) -> bool {
    let mut referenced: HashSet<String> = HashSet::new();
    for instr in &program.instrs {
        for name in instr.referenced_labels() {
            referenced.insert(name.to_string());
        }
    }
    let to_remove: Vec<String> = program
        .labels
        .keys()
        .filter(|name| name.as_str() != "_start" && !referenced.contains(name.as_str()))
        .cloned()
        .collect();
    if to_remove.is_empty() {
        return false;
    }
    for name in &to_remove {
        debug!("unused label: {name}");
        program.instrs.retain(|instr| !matches!(instr, Instruction::Label(l) if &l.0 == name));
        program.labels.shift_remove(name);
    }
    true
}

/// Merge the *first* adjacent `label; label` pair found, then return. The
/// reference pass merged every adjacent pair found in one linear scan
/// against a pre-mutation snapshot; doing that for a run of three or more
/// consecutive labels renames the final label to the name of the *middle*
/// one after that name has already been folded away and removed from the
/// table, leaving a dangling reference — a violation of the Program
/// invariant that every referenced label stays in the table. Handling one
/// merge per call avoids that: the fixed-point driver (`optimize`) simply
/// invokes this pass again, and by then `remove_nops` has collapsed the
/// just-merged pair into a true adjacency for whatever followed it.
fn label_right_after(program: &mut Program) -> bool {
    let snapshot = program.instrs.clone();
    for i in 0..snapshot.len().saturating_sub(1) {
        if let (Instruction::Label(a), Instruction::Label(b)) = (&snapshot[i], &snapshot[i + 1]) {
            debug!("{a}; {b} => merge");
            program.instrs[i + 1] = Instruction::Nop;
            for instr in program.instrs.iter_mut() {
                instr.rename_label(b, a);
            }
            program.labels.shift_remove(&b.0);
            return true;
        }
    }
    false
}

fn mov_pop_to_leave(program: &mut Program) -> bool {
    use crate::x86::Register;
    let esp = Operand::reg(Register::Esp);
    let ebp = Operand::reg(Register::Ebp);
    let snapshot = program.instrs.clone();
    let mut found = false;
    for i in 0..snapshot.len().saturating_sub(1) {
        let a_matches = matches!(&snapshot[i], Instruction::Mov { dst, src } if *dst == esp && *src == ebp);
        let b_matches = matches!(&snapshot[i + 1], Instruction::Pop(dst) if *dst == ebp);
        if a_matches && b_matches {
            debug!("{}; {} => leave", snapshot[i], snapshot[i + 1]);
            program.instrs[i] = Instruction::Leave;
            program.instrs[i + 1] = Instruction::Nop;
            found = true;
        }
    }
    found
}

fn zero_add_sub(program: &mut Program) -> bool {
    let mut found = false;
    for i in 0..program.instrs.len() {
        let is_zero = match &program.instrs[i] {
            Instruction::Add { src, .. } | Instruction::Sub { src, .. } => *src == Operand::imm(0),
            _ => false,
        };
        if is_zero {
            debug!("{} => nop", program.instrs[i]);
            program.instrs[i] = Instruction::Nop;
            found = true;
        }
    }
    found
}

fn move_ab_ba(program: &mut Program) -> bool {
    let snapshot = program.instrs.clone();
    let mut found = false;
    for i in 0..snapshot.len().saturating_sub(1) {
        let (a_dst, a_src) = match &snapshot[i] {
            Instruction::Mov { dst, src } => (dst, src),
            _ => continue,
        };
        if a_src.kind() == OperandKind::Memory {
            continue;
        }
        let b = &snapshot[i + 1];
        let b_src = match b.src() {
            Some(src) => src,
            None => continue,
        };
        if b_src != a_dst {
            continue;
        }
        let legal = match b.legal_src_kinds() {
            Some(kinds) => kinds,
            None => continue,
        };
        if !legal.contains(&a_src.kind()) {
            continue;
        }
        let mut new_b = b.clone();
        new_b.set_src(a_src.clone());
        debug!("{}; {b} => {}; {new_b}", snapshot[i], snapshot[i]);
        program.instrs[i + 1] = new_b;
        found = true;
    }
    found
}

fn move_dead_writes(program: &mut Program) -> bool {
    let mut found = false;
    let mut write_targets: HashMap<Operand, usize> = HashMap::new();
    for i in 0..program.instrs.len() {
        let instr = &program.instrs[i];
        if instr.alters_flow() {
            write_targets.clear();
            continue;
        }
        let dst = match instr {
            Instruction::Mov { dst, .. } => Some(dst.clone()),
            _ => None,
        };
        let src = instr.src().cloned();
        if let Some(dst) = dst {
            if let Some(&write_i) = write_targets.get(&dst) {
                debug!("deleting dead write {}", program.instrs[write_i]);
                program.instrs[write_i] = Instruction::Nop;
                found = true;
            }
            write_targets.insert(dst, i);
        }
        if let Some(src) = src {
            write_targets.remove(&src);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::x86::{Label, Register};

    fn program_with(instrs: Vec<Instruction>) -> Program {
        let mut program = Program::default();
        for instr in instrs {
            if let Instruction::Label(l) = &instr {
                program.labels.insert(l.0.clone(), l.clone());
            }
            program.instrs.push(instr);
        }
        program
    }

    #[test]
    fn push_then_pop_fuses_into_mov() {
        let mut program = program_with(vec![
            Instruction::Push(Operand::imm(1)),
            Instruction::Pop(Operand::reg(Register::Eax)),
        ]);
        assert!(push_then_pop(&mut program));
        assert_eq!(program.instrs[0], Instruction::Mov { dst: Operand::reg(Register::Eax), src: Operand::imm(1) });
        assert_eq!(program.instrs[1], Instruction::Nop);
    }

    #[test]
    fn dead_write_is_removed_when_overwritten_before_use() {
        let mem = Operand::mem(Register::Ebp, -4);
        let mut program = program_with(vec![
            Instruction::Mov { dst: mem.clone(), src: Operand::imm(1) },
            Instruction::Mov { dst: mem.clone(), src: Operand::imm(2) },
        ]);
        assert!(move_dead_writes(&mut program));
        assert_eq!(program.instrs[0], Instruction::Nop);
        assert_eq!(program.instrs[1], Instruction::Mov { dst: mem, src: Operand::imm(2) });
    }

    #[test]
    fn unused_label_keeps_start_and_called_entries() {
        let mut program = program_with(vec![
            Instruction::Label(Label("_start".to_string())),
            Instruction::Label(Label("l1".to_string())),
            Instruction::Nop,
        ]);
        assert!(unused_label(&mut program));
        assert!(program.labels.contains_key("_start"));
        assert!(!program.labels.contains_key("l1"));
    }

    #[test]
    fn optimize_reaches_a_fixed_point() {
        let mut program = program_with(vec![
            Instruction::Push(Operand::imm(1)),
            Instruction::Pop(Operand::reg(Register::Eax)),
            Instruction::Add { dst: Operand::reg(Register::Eax), src: Operand::imm(0) },
        ]);
        optimize(&mut program);
        let mut twice = Program { instrs: program.instrs.clone(), labels: program.labels.clone(), ..Program::default() };
        optimize(&mut twice);
        assert_eq!(program.instrs, twice.instrs);
    }
}
