// Code Generator (spec.md §4.2). Walks the typed tree and emits a flat,
// ordered list of abstract x86 instructions plus a label table, following
// an evaluation-stack discipline: every expression pushes its result: every
// consumer pops.

use indexmap::IndexMap;
use log::trace;

use crate::ast::{ArithOp, BoolOp, RelOp, UnOp};
use crate::error::{CompileError, Result};
use crate::types::Type;
use crate::typed::{TypedExpr, TypedExprKind, TypedFunction, TypedProgram, TypedStmt};
use crate::x86::{Instruction, Label, Operand, Register};

/// The code generator's output: an ordered instruction list and the table
/// of every label defined in it. Invariant (spec.md §3): every label
/// referenced as a jump/call target is present in the table, and a label
/// name is defined at most once.
#[derive(Debug, Default)]
pub struct Program {
    pub instrs: Vec<Instruction>,
    pub labels: IndexMap<String, Label>,
    label_count: u32,
}

impl Program {
    fn new() -> Program {
        Program::default()
    }

    fn emit(&mut self, instr: Instruction) {
        if let Instruction::Label(label) = &instr {
            self.labels.entry(label.0.clone()).or_insert_with(|| label.clone());
        }
        self.instrs.push(instr);
    }

    /// Insert a label into the table ahead of its definition, so that a
    /// forward jump can resolve it before the code generator reaches the
    /// point the label is actually emitted. Fails if the name is already
    /// reserved.
    fn reserve_label(&mut self, name: impl Into<String>) -> Result<Label> {
        let name = name.into();
        if self.labels.contains_key(&name) {
            return Err(CompileError::DuplicateLabel(name));
        }
        let label = Label(name.clone());
        self.labels.insert(name, label.clone());
        Ok(label)
    }

    fn get_label(&self, name: &str) -> Result<Label> {
        self.labels.get(name).cloned().ok_or_else(|| CompileError::UnresolvedLabel(name.to_string()))
    }

    fn new_label(&mut self) -> Result<Label> {
        self.label_count += 1;
        self.reserve_label(format!("l{}", self.label_count))
    }
}

fn eax() -> Operand {
    Operand::reg(Register::Eax)
}
fn ebx() -> Operand {
    Operand::reg(Register::Ebx)
}
fn ecx() -> Operand {
    Operand::reg(Register::Ecx)
}
fn edx() -> Operand {
    Operand::reg(Register::Edx)
}
fn al() -> Operand {
    Operand::reg(Register::Al)
}
fn cl() -> Operand {
    Operand::reg(Register::Cl)
}
fn ebp() -> Operand {
    Operand::reg(Register::Ebp)
}
fn esp() -> Operand {
    Operand::reg(Register::Esp)
}

pub fn compile_program(program: &TypedProgram) -> Result<Program> {
    let mut out = Program::new();
    for func in &program.functions {
        compile_function(&mut out, func)?;
    }
    compile_main(&mut out, &program.top_level, program.top_level_stack_size)?;
    Ok(out)
}

fn compile_function(out: &mut Program, func: &TypedFunction) -> Result<()> {
    trace!("compiling function {}", func.name);
    out.emit(Instruction::Label(Label(format!("_{}", func.name))));
    let end = out.reserve_label(format!("{}_end", func.name))?;
    out.emit(Instruction::Push(ebp()));
    out.emit(Instruction::Mov { dst: ebp(), src: esp() });
    out.emit(Instruction::Sub { dst: esp(), src: Operand::imm(func.stack_size - func.body_scope_offset) });
    compile_block(out, &func.body, &func.name)?;
    out.emit(Instruction::Label(end));
    out.emit(Instruction::Mov { dst: esp(), src: ebp() });
    out.emit(Instruction::Pop(ebp()));
    out.emit(Instruction::Ret);
    Ok(())
}

fn compile_main(out: &mut Program, stmts: &[TypedStmt], stack_size: i32) -> Result<()> {
    out.emit(Instruction::Label(Label("_start".to_string())));
    out.emit(Instruction::Push(ebp()));
    out.emit(Instruction::Mov { dst: ebp(), src: esp() });
    out.emit(Instruction::Sub { dst: esp(), src: Operand::imm(stack_size) });
    compile_block(out, stmts, "_main")?;
    out.emit(Instruction::Mov { dst: eax(), src: Operand::imm(1) });
    out.emit(Instruction::Mov { dst: ebx(), src: Operand::imm(0) });
    out.emit(Instruction::Int(0x80));
    Ok(())
}

fn compile_block(out: &mut Program, stmts: &[TypedStmt], current_function: &str) -> Result<()> {
    for stmt in stmts {
        compile_stmt(out, stmt, current_function)?;
    }
    Ok(())
}

fn compile_stmt(out: &mut Program, stmt: &TypedStmt, current_function: &str) -> Result<()> {
    match stmt {
        TypedStmt::Expr(expr) => {
            let discard = expr.ty != Type::Void;
            compile_expr(out, expr)?;
            if discard {
                out.emit(Instruction::Pop(eax()));
            }
        }
        TypedStmt::Decl { frame_offset, init } => {
            match init {
                Some(expr) => {
                    compile_expr(out, expr)?;
                    out.emit(Instruction::Pop(eax()));
                }
                None => out.emit(Instruction::Mov { dst: eax(), src: Operand::imm(0) }),
            }
            out.emit(Instruction::Mov { dst: Operand::mem(Register::Ebp, *frame_offset), src: eax() });
        }
        TypedStmt::Assign { frame_offset, value } => {
            compile_expr(out, value)?;
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Mov { dst: Operand::mem(Register::Ebp, *frame_offset), src: eax() });
        }
        TypedStmt::If { cond, then_branch, else_branch } => {
            compile_expr(out, cond)?;
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Cmp { dst: eax(), src: Operand::imm(0) });
            let orelse = out.new_label()?;
            out.emit(Instruction::Je(orelse.clone()));
            compile_block(out, then_branch, current_function)?;
            let endif = out.new_label()?;
            out.emit(Instruction::Jmp(endif.clone()));
            out.emit(Instruction::Label(orelse));
            if let Some(else_stmt) = else_branch {
                compile_stmt(out, else_stmt, current_function)?;
            }
            out.emit(Instruction::Label(endif));
        }
        TypedStmt::Block(body) => compile_block(out, body, current_function)?,
        TypedStmt::While { cond, body } => {
            let start = out.new_label()?;
            let end = out.new_label()?;
            out.emit(Instruction::Label(start.clone()));
            compile_expr(out, cond)?;
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Cmp { dst: eax(), src: Operand::imm(0) });
            out.emit(Instruction::Je(end.clone()));
            compile_block(out, body, current_function)?;
            out.emit(Instruction::Jmp(start));
            out.emit(Instruction::Label(end));
        }
        TypedStmt::Return(expr) => {
            compile_expr(out, expr)?;
            out.emit(Instruction::Pop(eax()));
            let end = out.get_label(&format!("{current_function}_end"))?;
            out.emit(Instruction::Jmp(end));
        }
    }
    Ok(())
}

fn compile_expr(out: &mut Program, expr: &TypedExpr) -> Result<()> {
    match &expr.kind {
        TypedExprKind::Int(v) => out.emit(Instruction::Push(Operand::imm(*v as i32))),
        TypedExprKind::Bool(v) => out.emit(Instruction::Push(Operand::imm(if *v { 1 } else { 0 }))),
        TypedExprKind::Var { frame_offset } => {
            out.emit(Instruction::Mov { dst: eax(), src: Operand::mem(Register::Ebp, *frame_offset) });
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Unary(op, inner) => {
            compile_expr(out, inner)?;
            out.emit(Instruction::Pop(eax()));
            match op {
                UnOp::Neg => out.emit(Instruction::Neg(eax())),
                UnOp::Non => {
                    out.emit(Instruction::Cmp { dst: eax(), src: Operand::imm(0) });
                    out.emit(Instruction::Sete(al()));
                    out.emit(Instruction::Movzx { dst: eax(), src: al() });
                }
            }
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Arith(op, lhs, rhs) => {
            compile_expr(out, lhs)?;
            compile_expr(out, rhs)?;
            out.emit(Instruction::Pop(ebx()));
            out.emit(Instruction::Pop(eax()));
            match op {
                ArithOp::Add => out.emit(Instruction::Add { dst: eax(), src: ebx() }),
                ArithOp::Sub => out.emit(Instruction::Sub { dst: eax(), src: ebx() }),
                ArithOp::Mul => out.emit(Instruction::Imul { dst: eax(), src: ebx() }),
                ArithOp::Div => {
                    out.emit(Instruction::Mov { dst: edx(), src: Operand::imm(0) });
                    out.emit(Instruction::Idiv(ebx()));
                }
                ArithOp::Mod => {
                    out.emit(Instruction::Mov { dst: edx(), src: Operand::imm(0) });
                    out.emit(Instruction::Idiv(ebx()));
                    out.emit(Instruction::Mov { dst: eax(), src: edx() });
                }
            }
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Rel(op, lhs, rhs) => {
            compile_expr(out, lhs)?;
            compile_expr(out, rhs)?;
            out.emit(Instruction::Pop(ebx()));
            out.emit(Instruction::Pop(ecx()));
            out.emit(Instruction::Cmp { dst: ecx(), src: ebx() });
            match op {
                RelOp::Eq => out.emit(Instruction::Sete(al())),
                RelOp::Ne => out.emit(Instruction::Setne(al())),
                RelOp::Lt => out.emit(Instruction::Setl(al())),
                RelOp::Le => out.emit(Instruction::Setle(al())),
                RelOp::Gt => out.emit(Instruction::Setg(al())),
                RelOp::Ge => out.emit(Instruction::Setge(al())),
            }
            out.emit(Instruction::Movzx { dst: eax(), src: al() });
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Logic(BoolOp::Ou, lhs, rhs) => {
            compile_expr(out, lhs)?;
            compile_expr(out, rhs)?;
            out.emit(Instruction::Pop(ebx()));
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Or { dst: eax(), src: ebx() });
            out.emit(Instruction::Setne(al()));
            out.emit(Instruction::Movzx { dst: eax(), src: al() });
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Logic(BoolOp::Et, lhs, rhs) => {
            // Each operand is popped and normalized to a 0/1 flag before
            // combining, rather than `and`-ing the raw stack values
            // together (spec.md §4.2).
            compile_expr(out, lhs)?;
            compile_expr(out, rhs)?;
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Cmp { dst: eax(), src: Operand::imm(0) });
            out.emit(Instruction::Setne(al()));
            out.emit(Instruction::Pop(ecx()));
            out.emit(Instruction::Cmp { dst: ecx(), src: Operand::imm(0) });
            out.emit(Instruction::Setne(cl()));
            out.emit(Instruction::And { dst: cl(), src: al() });
            out.emit(Instruction::Movzx { dst: eax(), src: cl() });
            out.emit(Instruction::Push(eax()));
        }
        TypedExprKind::Call { name, args, arg_bytes, returns_value } => {
            compile_call(out, name, args, *arg_bytes, *returns_value)?;
        }
    }
    Ok(())
}

fn compile_call(out: &mut Program, name: &str, args: &[TypedExpr], arg_bytes: i32, returns_value: bool) -> Result<()> {
    match name {
        "lire" => {
            out.emit(Instruction::Mov { dst: eax(), src: Operand::Global("sinput".to_string()) });
            out.emit(Instruction::Call("readline".to_string()));
            out.emit(Instruction::Call("atoi".to_string()));
            out.emit(Instruction::Push(eax()));
        }
        "ecrire" => {
            compile_expr(out, &args[0])?;
            out.emit(Instruction::Pop(eax()));
            out.emit(Instruction::Call("iprintLF".to_string()));
        }
        _ => {
            for arg in args.iter().rev() {
                compile_expr(out, arg)?;
            }
            out.emit(Instruction::Call(format!("_{name}")));
            // Emitted unconditionally, even when `arg_bytes` is zero; the
            // `zero_add_sub` peephole pass (§4.3) cleans up the no-op case.
            out.emit(Instruction::Add { dst: esp(), src: Operand::imm(arg_bytes) });
            if returns_value {
                out.emit(Instruction::Push(eax()));
            }
        }
    }
    Ok(())
}
