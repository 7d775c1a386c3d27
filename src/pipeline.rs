// Top-level glue: source text in, pre- and post-optimization NASM text out.
// Mirrors the reference driver's `process()` + `main()` shape (parse,
// analyze, compile, optimize, emit twice), but returns both assembly texts
// to the caller instead of writing files itself — file I/O belongs to the
// CLI binary (spec.md §1's external collaborator).

use log::info;

use crate::analyzer::Analyzer;
use crate::codegen;
use crate::emit;
use crate::error::Result;
use crate::optimizer;
use crate::parser;

/// The pre- and post-optimization assembly text for one source file.
pub struct CompiledProgram {
    pub raw_asm: String,
    pub optimized_asm: String,
}

pub fn compile(source: &str) -> Result<CompiledProgram> {
    info!("parsing source ({} bytes)", source.len());
    let tree = parser::parse(source)?;

    info!("running scope & type analysis");
    let typed = Analyzer::analyze_program(&tree)?;

    info!("generating code for {} function(s)", typed.functions.len());
    let mut program = codegen::compile_program(&typed)?;
    let raw_asm = emit::emit(&program);

    info!("running peephole optimizer");
    optimizer::optimize(&mut program);
    let optimized_asm = emit::emit(&program);

    Ok(CompiledProgram { raw_asm, optimized_asm })
}
