// Assembly Emitter (spec.md §4.4). Serializes a code generator's Program to
// NASM text behind a fixed header; every instruction's own `Display` impl
// (src/x86.rs) already renders the mechanical per-mnemonic formatting
// rules, so this stage is a thin join.

use crate::codegen::Program;

const HEADER: &[&str] = &[
    "%include \"io.asm\"",
    "section .bss",
    "sinput: resb 255",
    "v$a:    resd 1",
    "section .text",
    "global _start",
];

/// Render the full NASM source text for `program`. The header is exactly
/// the 7 lines spec.md §4.4 fixes (6 header lines plus the first
/// instruction line), which the reporting utility skips when comparing
/// pre- and post-optimization line counts.
pub fn emit(program: &Program) -> String {
    let mut lines: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();
    lines.extend(program.instrs.iter().map(|instr| instr.to_string()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x86::{Instruction, Label};

    #[test]
    fn header_is_six_lines_before_the_instruction_stream() {
        let program = Program { instrs: vec![Instruction::Label(Label("_start".to_string()))], ..Program::default() };
        let text = emit(&program);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), HEADER.len() + 1);
        assert_eq!(lines[HEADER.len()], "_start:");
    }
}
