// The analyzer's output tree. Every expression node already carries its
// resolved `Type`; every variable reference already carries its resolved,
// `ebp`-relative frame offset. The code generator consumes only this tree
// and never re-resolves a name against a scope (design note §9: "a
// dedicated typed AST distinct from the parser's output").

use crate::ast::{ArithOp, BoolOp, RelOp, UnOp};
use crate::types::Type;

#[derive(Clone, Debug, PartialEq)]
pub enum TypedExprKind {
    Int(i64),
    Bool(bool),
    /// A resolved variable read: the signed, `ebp`-relative byte offset at
    /// which the value lives.
    Var { frame_offset: i32 },
    Unary(UnOp, Box<TypedExpr>),
    Arith(ArithOp, Box<TypedExpr>, Box<TypedExpr>),
    Rel(RelOp, Box<TypedExpr>, Box<TypedExpr>),
    Logic(BoolOp, Box<TypedExpr>, Box<TypedExpr>),
    /// A resolved call: `arg_bytes` is the total byte size of the callee's
    /// parameters (what the caller must pop off `esp` after the `call`),
    /// and `returns_value` says whether a result is pushed onto the
    /// expression stack afterward. Resolving these at analysis time means
    /// codegen never needs to look the callee back up in a scope.
    Call {
        name: String,
        args: Vec<TypedExpr>,
        arg_bytes: i32,
        returns_value: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Type,
}

impl TypedExpr {
    pub fn new(kind: TypedExprKind, ty: Type) -> TypedExpr {
        TypedExpr { kind, ty }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedStmt {
    Expr(TypedExpr),
    Decl {
        frame_offset: i32,
        init: Option<TypedExpr>,
    },
    Assign {
        frame_offset: i32,
        value: TypedExpr,
    },
    If {
        cond: TypedExpr,
        then_branch: Vec<TypedStmt>,
        else_branch: Option<Box<TypedStmt>>,
    },
    Block(Vec<TypedStmt>),
    While {
        cond: TypedExpr,
        body: Vec<TypedStmt>,
    },
    Return(TypedExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypedFunction {
    pub name: String,
    pub return_type: Type,
    /// High-water-mark local storage for this function, as defined by
    /// spec.md §3: the max, over all of the function's descendant scopes,
    /// of that scope's cumulative local-byte depth.
    pub stack_size: i32,
    /// The function body scope's own `offset`, always computed rather than
    /// assumed to be zero (spec.md §4.2's prologue formula is `sub esp, N =
    /// stack_size - body_scope.offset`).
    pub body_scope_offset: i32,
    pub body: Vec<TypedStmt>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct TypedProgram {
    pub functions: Vec<TypedFunction>,
    pub top_level: Vec<TypedStmt>,
    pub top_level_stack_size: i32,
}
