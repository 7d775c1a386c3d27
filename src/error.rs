// Fatal error kinds for every stage of the pipeline. The compiler aborts at
// the first one raised; there is no structured recovery (spec.md §7).

use crate::types::{KindSet, Type};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("undefined name: {0}")]
    UnresolvedName(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },

    #[error("arity mismatch calling {name}: expected {expected} arguments, found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} to {name} has type {found:?}, which is not a member of {expected:?}")]
    ArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: KindSet,
        found: Type,
    },

    #[error("unresolved label: {0}")]
    UnresolvedLabel(String),

    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = core::result::Result<T, CompileError>;
