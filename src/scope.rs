// Lexical scope tree, function table, and frame-offset arithmetic
// (spec.md §3). Scopes form an acyclic tree with upward parent references;
// following design note §9 ("arena-allocated nodes ... or shared-ownership
// handles"), we use `Rc`-shared, internally mutable nodes — the same shape
// the teacher's `Env<T>` used for lexical scoping, generalized here to also
// carry a function table and the offset bookkeeping spec.md §3 requires.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{CompileError, Result};
use crate::types::{KindSet, Type};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub ty: Type,
    pub offset: i32,
}

/// A function's signature and its high-water-mark local-storage size. The
/// handle is shared (via `Rc<RefCell<_>>`) between the scope that declares
/// the function and every nested scope within its body, so that
/// `stack_size` updates performed while analyzing deeply nested blocks are
/// visible to the function as a whole.
#[derive(Debug)]
pub struct FunctionMeta {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<(String, KindSet)>,
    pub stack_size: i32,
}

pub type FunctionHandle = Rc<RefCell<FunctionMeta>>;

pub fn builtin_function(name: &str, return_type: Type, params: Vec<(String, KindSet)>) -> FunctionHandle {
    Rc::new(RefCell::new(FunctionMeta {
        name: name.to_string(),
        return_type,
        params,
        stack_size: 0,
    }))
}

struct ScopeInner {
    functions: IndexMap<String, FunctionHandle>,
    variables: IndexMap<String, Variable>,
    parent: Option<Scope>,
    parent_function: Option<FunctionHandle>,
    offset: i32,
    /// Set only on the scope `child_for_function` hands back: the boundary
    /// a variable/frame-offset lookup must not cross. A function's body may
    /// be declared anywhere in the tree (`analyze_block` flattens nested
    /// `si`/`tantque`-local definitions into the same function list), so its
    /// `params_scope`'s lexical parent is whatever scope was active at the
    /// declaration site, not necessarily the root — without this boundary a
    /// nested function would resolve an enclosing function's locals through
    /// its own unrelated `ebp`. Function-name lookup (`get_function`) has no
    /// such restriction: calling a sibling or enclosing function is legal.
    is_function_root: bool,
}

/// A node in the scope tree. Cloning a `Scope` is cheap (an `Rc` bump) and
/// yields another handle to the same underlying node.
#[derive(Clone)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    fn new(parent: Option<Scope>, parent_function: Option<FunctionHandle>, offset: i32) -> Scope {
        Scope(Rc::new(RefCell::new(ScopeInner {
            functions: IndexMap::new(),
            variables: IndexMap::new(),
            parent,
            parent_function,
            offset,
            is_function_root: false,
        })))
    }

    /// The root scope: no parent, no enclosing function, pre-declaring the
    /// built-ins `ecrire` and `lire` (spec.md §3 invariant).
    pub fn root() -> Scope {
        let scope = Scope::new(None, None, 0);
        {
            let mut inner = scope.0.borrow_mut();
            inner.functions.insert(
                "ecrire".to_string(),
                builtin_function(
                    "ecrire",
                    Type::Void,
                    vec![(
                        "valeur".to_string(),
                        crate::types::Kind::Integer | crate::types::Kind::Boolean,
                    )],
                ),
            );
            inner.functions.insert(
                "lire".to_string(),
                builtin_function("lire", Type::Integer, vec![]),
            );
        }
        scope
    }

    /// A fresh child scope sharing this scope's enclosing function, whose
    /// offset begins right after this scope's own locals.
    pub fn child(&self) -> Scope {
        let (parent_function, offset) = {
            let inner = self.0.borrow();
            (inner.parent_function.clone(), inner.offset + self.next_address())
        };
        Scope::new(Some(self.clone()), parent_function, offset)
    }

    /// A fresh child scope for a new function's parameter/linkage layer,
    /// whose offset begins wherever this scope currently stands. Marked as
    /// a function-root boundary: variable/frame-offset lookups starting
    /// inside the returned scope (or any of its descendants) stop here
    /// rather than continuing into `self`, since `self` may belong to a
    /// lexically enclosing function with an unrelated `ebp`.
    pub fn child_for_function(&self, parent_function: FunctionHandle) -> Scope {
        let offset = {
            let inner = self.0.borrow();
            inner.offset + self.next_address()
        };
        let scope = Scope::new(Some(self.clone()), Some(parent_function), offset);
        scope.0.borrow_mut().is_function_root = true;
        scope
    }

    pub fn parent_function(&self) -> FunctionHandle {
        self.0
            .borrow()
            .parent_function
            .clone()
            .expect("scope has no enclosing function")
    }

    pub fn offset(&self) -> i32 {
        self.0.borrow().offset
    }

    pub fn set_offset(&self, offset: i32) {
        self.0.borrow_mut().offset = offset;
    }

    /// One past the highest byte address used by a variable declared
    /// directly in this scope (not counting parents).
    pub fn next_address(&self) -> i32 {
        let inner = self.0.borrow();
        match inner.variables.values().last() {
            Some(last) => last.offset + last.ty.size(),
            None => 0,
        }
    }

    /// The running total of bytes from the start of this scope's own locals
    /// down to the enclosing function's frame pointer, i.e. `offset +
    /// next_address()`. Declaring a new local updates the owning function's
    /// `stack_size` to the max of its current value and this quantity,
    /// giving mutually-exclusive branches (different `si`/`tantque` bodies)
    /// a shared, non-additive frame budget.
    fn stack_depth(&self) -> i32 {
        let inner = self.0.borrow();
        match &inner.parent {
            None => 0,
            Some(_) => inner.offset + self.next_address(),
        }
    }

    pub fn declare(&self, name: &str, ty: Type) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        if inner.variables.contains_key(name) {
            return Err(CompileError::InternalInvariant(format!(
                "variable '{name}' redeclared in the same scope"
            )));
        }
        let offset = match inner.variables.values().last() {
            Some(last) => last.offset + last.ty.size(),
            None => 0,
        };
        inner.variables.insert(name.to_string(), Variable { ty, offset });
        let parent_function = inner.parent_function.clone();
        drop(inner);
        if let Some(func) = parent_function {
            let depth = self.stack_depth();
            let mut func = func.borrow_mut();
            func.stack_size = func.stack_size.max(depth);
        }
        Ok(())
    }

    pub fn declare_function(&self, name: &str, handle: FunctionHandle) {
        self.0.borrow_mut().functions.insert(name.to_string(), handle);
    }

    pub fn get_function(&self, name: &str) -> Result<FunctionHandle> {
        let inner = self.0.borrow();
        if let Some(f) = inner.functions.get(name) {
            return Ok(f.clone());
        }
        match &inner.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(inner);
                parent.get_function(name)
            }
            None => Err(CompileError::UnresolvedName(name.to_string())),
        }
    }

    pub fn get_variable_type(&self, name: &str) -> Result<Type> {
        let inner = self.0.borrow();
        if let Some(v) = inner.variables.get(name) {
            return Ok(v.ty);
        }
        if inner.is_function_root {
            return Err(CompileError::UnresolvedName(name.to_string()));
        }
        match &inner.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(inner);
                parent.get_variable_type(name)
            }
            None => Err(CompileError::UnresolvedName(name.to_string())),
        }
    }

    /// The signed, `ebp`-relative byte offset at which `name` lives:
    /// `-(scope.offset + variable.offset + variable.type.size())`, walking
    /// the scope chain up to (and no further than) the enclosing function's
    /// own `params_scope` (spec.md §3) — a function-root scope never
    /// delegates to its parent, so a nested function definition can never
    /// resolve a name through a lexically enclosing function's frame.
    pub fn frame_offset(&self, name: &str) -> Result<i32> {
        let inner = self.0.borrow();
        if let Some(v) = inner.variables.get(name) {
            return Ok(-(inner.offset + v.offset + v.ty.size()));
        }
        if inner.is_function_root {
            return Err(CompileError::UnresolvedName(name.to_string()));
        }
        match &inner.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(inner);
                parent.frame_offset(name)
            }
            None => Err(CompileError::UnresolvedName(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_scope_predeclares_builtins() {
        let root = Scope::root();
        let ecrire = root.get_function("ecrire").unwrap();
        assert_eq!(ecrire.borrow().return_type, Type::Void);
        let lire = root.get_function("lire").unwrap();
        assert_eq!(lire.borrow().return_type, Type::Integer);
    }

    #[test]
    fn local_offsets_grow_downward_from_zero() {
        let root = Scope::root();
        let main = builtin_function("_main", Type::Void, vec![]);
        let top = root.child_for_function(main.clone());
        top.declare("x", Type::Integer).unwrap();
        top.declare("y", Type::Boolean).unwrap();
        assert_eq!(top.frame_offset("x").unwrap(), -4);
        assert_eq!(top.frame_offset("y").unwrap(), -8);
        assert_eq!(main.borrow().stack_size, 8);
    }

    #[test]
    fn sibling_branches_share_a_high_water_mark() {
        let root = Scope::root();
        let main = builtin_function("_main", Type::Void, vec![]);
        let top = root.child_for_function(main.clone());

        let then_branch = top.child();
        then_branch.declare("a", Type::Integer).unwrap();
        then_branch.declare("b", Type::Integer).unwrap();

        let else_branch = top.child();
        else_branch.declare("c", Type::Integer).unwrap();

        // then_branch used 8 bytes, else_branch only 4; the function's
        // stack_size reflects the max across mutually exclusive paths, not
        // their sum.
        assert_eq!(main.borrow().stack_size, 8);
    }

    #[test]
    fn nested_function_cannot_resolve_an_enclosing_locals_frame_offset() {
        // entier x = 10; si (vrai) { entier g() { retourner x; } }
        let root = Scope::root();
        let main = builtin_function("_main", Type::Void, vec![]);
        let top = root.child_for_function(main.clone());
        top.declare("x", Type::Integer).unwrap();

        let if_body = top.child();
        let g = builtin_function("g", Type::Integer, vec![]);
        let g_params_scope = if_body.child_for_function(g);

        assert!(g_params_scope.get_variable_type("x").is_err());
        assert!(g_params_scope.frame_offset("x").is_err());

        // function-name resolution is unaffected: g can still call main's
        // sibling functions or itself through the full lexical chain.
        assert!(g_params_scope.get_function("ecrire").is_ok());
    }

    #[test]
    fn parameter_layout_matches_cdecl() {
        // entier f(entier n) { ... } — n at [ebp+8], $ra at [ebp+4],
        // $old_ebp at [ebp+0].
        let root = Scope::root();
        let f = builtin_function(
            "f",
            Type::Integer,
            vec![("n".to_string(), enumflags2::BitFlags::from_flag(crate::types::Kind::Integer))],
        );
        let params = root.child_for_function(f.clone());
        params.declare("n", Type::Integer).unwrap();
        params.declare("$ra", Type::Integer).unwrap();
        params.declare("$old_ebp", Type::Integer).unwrap();

        let stack_size_before_reset = f.borrow().stack_size;
        params.set_offset(-stack_size_before_reset);
        f.borrow_mut().stack_size = 0;

        assert_eq!(params.frame_offset("n").unwrap(), 8);
        assert_eq!(params.frame_offset("$ra").unwrap(), 4);
        assert_eq!(params.frame_offset("$old_ebp").unwrap(), 0);

        let body = params.child();
        assert_eq!(body.offset(), 0);
    }
}
