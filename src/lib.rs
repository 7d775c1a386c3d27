// flo: a whole-program compiler for the flo teaching language, targeting
// 32-bit x86 NASM assembly.
//
// The pipeline runs in four fixed stages over a single parse tree: the
// Scope & Type Analyzer resolves every name and checks every type
// (`analyzer`, building on `scope`/`types`/`typed`), the Code Generator
// lowers the typed tree to an abstract instruction list (`codegen`, built on
// `x86`), the Peephole Optimizer rewrites that list to a fixed point
// (`optimizer`), and the Assembly Emitter serializes it to NASM text
// (`emit`). `lexer`/`parser` turn source text into the `ast` the analyzer
// consumes; `pipeline` wires all five stages together; `error` defines the
// single error type threaded through every stage.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod pipeline;
pub mod scope;
pub mod typed;
pub mod types;
pub mod x86;
