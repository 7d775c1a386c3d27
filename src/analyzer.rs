// Scope & Type Analyzer (spec.md §4.1). Walks the parse tree once, hoisting
// function signatures to the top of every block, assigning each variable a
// frame offset, type-checking every construct, and producing the typed tree
// the code generator consumes.

use log::trace;

use crate::ast::{self, ArithOp, BoolOp, Expr, RelOp, Stmt, UnOp};
use crate::error::{CompileError, Result};
use crate::scope::{self, FunctionHandle, Scope};
use crate::types::{self, Type};
use crate::typed::{TypedExpr, TypedExprKind, TypedFunction, TypedProgram, TypedStmt};

pub struct Analyzer {
    scope: Scope,
}

impl Analyzer {
    /// Analyze a whole program: the top level is treated as the body of an
    /// implicit `_main` function (spec.md §4.2's "program entry"), so
    /// top-level locals share the same offset/stack-size machinery as any
    /// other function body.
    pub fn analyze_program(program: &ast::Program) -> Result<TypedProgram> {
        let root = Scope::root();
        let main = scope::builtin_function("_main", Type::Void, vec![]);
        let top_scope = root.child_for_function(main.clone());
        let mut analyzer = Analyzer { scope: top_scope };
        let (top_level, functions) = analyzer.analyze_block(program)?;
        Ok(TypedProgram {
            functions,
            top_level,
            top_level_stack_size: main.borrow().stack_size,
        })
    }

    /// Partition a block into statements and function definitions, hoist
    /// every function's signature ahead of body analysis, then analyze each
    /// function body and each statement in turn. Function definitions
    /// nested inside a non-top-level block (a `si`/`tantque` body, say) are
    /// hoisted and analyzed exactly like top-level ones and flattened into
    /// the same flat function list returned here, since the target
    /// instruction set has no notion of a nested procedure — every function
    /// becomes one more `_<name>` label regardless of where it was written.
    ///
    /// A nested function's own locals and parameters still resolve
    /// normally, and it may still call any function visible from its
    /// declaration site (a sibling, an enclosing function, or itself) —
    /// `get_function` walks the whole lexical chain. What it cannot do is
    /// read or write a variable declared in an *enclosing* function: its
    /// `params_scope` (built by `child_for_function` in `analyze_function`)
    /// is a frame-offset boundary, so `frame_offset`/`get_variable_type`
    /// stop there instead of silently resolving a name against the wrong
    /// function's `ebp`.
    fn analyze_block(&mut self, block: &ast::Block) -> Result<(Vec<TypedStmt>, Vec<TypedFunction>)> {
        let (stmts, funcs) = block.partition();

        let mut handles = Vec::with_capacity(funcs.len());
        for func in &funcs {
            let params: Vec<(String, types::KindSet)> =
                func.params.iter().map(|(name, ty)| (name.clone(), types::single(*ty))).collect();
            let handle = scope::builtin_function(&func.name, func.return_type, params);
            self.scope.declare_function(&func.name, handle.clone());
            handles.push(handle);
        }

        let mut typed_functions = Vec::with_capacity(funcs.len());
        for (func, handle) in funcs.iter().zip(handles.into_iter()) {
            let (own, nested) = self.analyze_function(func, handle)?;
            typed_functions.push(own);
            typed_functions.extend(nested);
        }

        let mut typed_stmts = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let (typed, nested) = self.analyze_stmt(stmt)?;
            typed_functions.extend(nested);
            typed_stmts.push(typed);
        }

        Ok((typed_stmts, typed_functions))
    }

    /// Analyze one function definition, returning it alongside any function
    /// definitions nested within its body — the target instruction set has
    /// no notion of a nested procedure, so every definition found anywhere
    /// in the tree surfaces as a sibling top-level label (see
    /// `analyze_block`'s doc comment).
    fn analyze_function(&self, func: &ast::Function, handle: FunctionHandle) -> Result<(TypedFunction, Vec<TypedFunction>)> {
        trace!("analyzing function {}", func.name);
        let params_scope = self.scope.child_for_function(handle.clone());
        for (name, ty) in func.params.iter().rev() {
            params_scope.declare(name, *ty)?;
        }
        params_scope.declare("$ra", Type::Integer)?;
        params_scope.declare("$old_ebp", Type::Integer)?;

        let param_stack_size = handle.borrow().stack_size;
        params_scope.set_offset(-param_stack_size);
        handle.borrow_mut().stack_size = 0;

        let body_scope = params_scope.child();
        let mut body_analyzer = Analyzer { scope: body_scope.clone() };
        let (body, nested_functions) = body_analyzer.analyze_block(&func.body)?;

        let typed = TypedFunction {
            name: func.name.clone(),
            return_type: func.return_type,
            stack_size: handle.borrow().stack_size,
            body_scope_offset: body_scope.offset(),
            body,
        };
        Ok((typed, nested_functions))
    }

    fn analyze_stmt(&self, stmt: &Stmt) -> Result<(TypedStmt, Vec<TypedFunction>)> {
        match stmt {
            Stmt::Expr(expr) => {
                let typed = self.analyze_expr(expr)?;
                Ok((TypedStmt::Expr(typed), Vec::new()))
            }
            Stmt::Decl { ty, name, init } => {
                let init = match init {
                    Some(expr) => {
                        let typed = self.analyze_expr(expr)?;
                        if typed.ty != *ty {
                            return Err(CompileError::TypeMismatch { expected: *ty, found: typed.ty });
                        }
                        Some(typed)
                    }
                    None => None,
                };
                self.scope.declare(name, *ty)?;
                let frame_offset = self.scope.frame_offset(name)?;
                Ok((TypedStmt::Decl { frame_offset, init }, Vec::new()))
            }
            Stmt::Assign { name, value } => {
                let declared = self.scope.get_variable_type(name)?;
                let typed = self.analyze_expr(value)?;
                if typed.ty != declared {
                    return Err(CompileError::TypeMismatch { expected: declared, found: typed.ty });
                }
                let frame_offset = self.scope.frame_offset(name)?;
                Ok((TypedStmt::Assign { frame_offset, value: typed }, Vec::new()))
            }
            Stmt::If { cond, then_branch, else_branch } => {
                let typed_cond = self.analyze_expr(cond)?;
                if typed_cond.ty != Type::Boolean {
                    return Err(CompileError::TypeMismatch { expected: Type::Boolean, found: typed_cond.ty });
                }
                let then_scope = self.scope.child();
                let mut then_analyzer = Analyzer { scope: then_scope };
                let (then_body, mut nested) = then_analyzer.analyze_block(then_branch)?;
                let else_branch = match else_branch {
                    Some(stmt) => {
                        let else_scope = self.scope.child();
                        let else_analyzer = Analyzer { scope: else_scope };
                        let (typed_else, else_nested) = else_analyzer.analyze_stmt(stmt)?;
                        nested.extend(else_nested);
                        Some(Box::new(typed_else))
                    }
                    None => None,
                };
                Ok((
                    TypedStmt::If { cond: typed_cond, then_branch: then_body, else_branch },
                    nested,
                ))
            }
            Stmt::Block(block) => {
                let child_scope = self.scope.child();
                let mut child_analyzer = Analyzer { scope: child_scope };
                let (body, nested) = child_analyzer.analyze_block(block)?;
                Ok((TypedStmt::Block(body), nested))
            }
            Stmt::While { cond, body } => {
                let typed_cond = self.analyze_expr(cond)?;
                if typed_cond.ty != Type::Boolean {
                    return Err(CompileError::TypeMismatch { expected: Type::Boolean, found: typed_cond.ty });
                }
                let body_scope = self.scope.child();
                let mut body_analyzer = Analyzer { scope: body_scope };
                let (typed_body, nested) = body_analyzer.analyze_block(body)?;
                Ok((TypedStmt::While { cond: typed_cond, body: typed_body }, nested))
            }
            Stmt::Return(expr) => {
                let typed = self.analyze_expr(expr)?;
                let expected = self.scope.parent_function().borrow().return_type;
                if typed.ty != expected {
                    return Err(CompileError::TypeMismatch { expected, found: typed.ty });
                }
                Ok((TypedStmt::Return(typed), Vec::new()))
            }
        }
    }

    fn analyze_expr(&self, expr: &Expr) -> Result<TypedExpr> {
        match expr {
            Expr::Int(v) => Ok(TypedExpr::new(TypedExprKind::Int(*v), Type::Integer)),
            Expr::Bool(v) => Ok(TypedExpr::new(TypedExprKind::Bool(*v), Type::Boolean)),
            Expr::Var(name) => {
                let ty = self.scope.get_variable_type(name)?;
                let frame_offset = self.scope.frame_offset(name)?;
                Ok(TypedExpr::new(TypedExprKind::Var { frame_offset }, ty))
            }
            Expr::Unary(op, inner) => {
                let typed_inner = self.analyze_expr(inner)?;
                let expected = match op {
                    UnOp::Neg => Type::Integer,
                    UnOp::Non => Type::Boolean,
                };
                if typed_inner.ty != expected {
                    return Err(CompileError::TypeMismatch { expected, found: typed_inner.ty });
                }
                let ty = typed_inner.ty;
                Ok(TypedExpr::new(TypedExprKind::Unary(*op, Box::new(typed_inner)), ty))
            }
            Expr::Arith(op, lhs, rhs) => self.analyze_binary_same_type(*op, lhs, rhs, Type::Integer, Type::Integer),
            Expr::Rel(op, lhs, rhs) => self.analyze_rel(*op, lhs, rhs),
            Expr::Logic(op, lhs, rhs) => self.analyze_logic(*op, lhs, rhs),
            Expr::Call(name, args) => self.analyze_call(name, args),
        }
    }

    fn analyze_binary_same_type(
        &self,
        op: ArithOp,
        lhs: &Expr,
        rhs: &Expr,
        operand_ty: Type,
        result_ty: Type,
    ) -> Result<TypedExpr> {
        let typed_lhs = self.analyze_expr(lhs)?;
        if typed_lhs.ty != operand_ty {
            return Err(CompileError::TypeMismatch { expected: operand_ty, found: typed_lhs.ty });
        }
        let typed_rhs = self.analyze_expr(rhs)?;
        if typed_rhs.ty != operand_ty {
            return Err(CompileError::TypeMismatch { expected: operand_ty, found: typed_rhs.ty });
        }
        Ok(TypedExpr::new(TypedExprKind::Arith(op, Box::new(typed_lhs), Box::new(typed_rhs)), result_ty))
    }

    fn analyze_rel(&self, op: RelOp, lhs: &Expr, rhs: &Expr) -> Result<TypedExpr> {
        let typed_lhs = self.analyze_expr(lhs)?;
        if typed_lhs.ty != Type::Integer {
            return Err(CompileError::TypeMismatch { expected: Type::Integer, found: typed_lhs.ty });
        }
        let typed_rhs = self.analyze_expr(rhs)?;
        if typed_rhs.ty != Type::Integer {
            return Err(CompileError::TypeMismatch { expected: Type::Integer, found: typed_rhs.ty });
        }
        Ok(TypedExpr::new(TypedExprKind::Rel(op, Box::new(typed_lhs), Box::new(typed_rhs)), Type::Boolean))
    }

    fn analyze_logic(&self, op: BoolOp, lhs: &Expr, rhs: &Expr) -> Result<TypedExpr> {
        let typed_lhs = self.analyze_expr(lhs)?;
        if typed_lhs.ty != Type::Boolean {
            return Err(CompileError::TypeMismatch { expected: Type::Boolean, found: typed_lhs.ty });
        }
        let typed_rhs = self.analyze_expr(rhs)?;
        if typed_rhs.ty != Type::Boolean {
            return Err(CompileError::TypeMismatch { expected: Type::Boolean, found: typed_rhs.ty });
        }
        Ok(TypedExpr::new(TypedExprKind::Logic(op, Box::new(typed_lhs), Box::new(typed_rhs)), Type::Boolean))
    }

    fn analyze_call(&self, name: &str, args: &[Expr]) -> Result<TypedExpr> {
        let func = self.scope.get_function(name)?;
        let (return_type, params) = {
            let func = func.borrow();
            (func.return_type, func.params.clone())
        };
        if args.len() != params.len() {
            return Err(CompileError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
            });
        }
        let mut typed_args = Vec::with_capacity(args.len());
        for (index, (arg, (_, accepted))) in args.iter().zip(params.iter()).enumerate() {
            let typed = self.analyze_expr(arg)?;
            if !typed.ty.satisfies(*accepted) {
                return Err(CompileError::ArgumentTypeMismatch {
                    name: name.to_string(),
                    index,
                    expected: *accepted,
                    found: typed.ty,
                });
            }
            typed_args.push(typed);
        }
        // Every parameter slot is one dword (spec.md §3: INTEGER and
        // BOOLEAN are both 4 bytes, and VOID can never occupy a parameter
        // position), so the caller's post-call `esp` adjustment is simply
        // 4 bytes per parameter.
        let arg_bytes: i32 = params.len() as i32 * 4;
        let returns_value = return_type != Type::Void;
        Ok(TypedExpr::new(
            TypedExprKind::Call { name: name.to_string(), args: typed_args, arg_bytes, returns_value },
            return_type,
        ))
    }
}
