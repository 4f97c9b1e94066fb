//! Scoped symbol table (spec §3.5): Global → Namespace → Class → Function →
//! Block. Each scope maps a name to an ordered list of overload candidates,
//! represented here as opaque AST node handles (`u32`) so this crate stays
//! independent of `novacc-ast`.

use crate::interner::StringHandle;
use indexmap::IndexMap;

pub type AstHandle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Function,
    Block,
}

#[derive(Default)]
struct Scope {
    kind: Option<ScopeKind>,
    names: IndexMap<StringHandle, Vec<AstHandle>>,
}

/// A stack of nested scopes, with lookup walking outward to the global
/// scope. The bottom of the stack (index 0) is always the process-wide
/// global scope and is never popped.
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                kind: Some(ScopeKind::Global),
                names: IndexMap::new(),
            }],
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind: Some(kind),
            names: IndexMap::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    /// RAII guard for a pushed scope: matches the teacher's pattern of
    /// scoped acquire/release primitives described in spec §9.
    pub fn scoped(&mut self, kind: ScopeKind) -> ScopeGuard<'_> {
        self.push_scope(kind);
        ScopeGuard { table: self }
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scopes.last().and_then(|s| s.kind).unwrap_or(ScopeKind::Global)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Inserts `name -> node` into the current (innermost) scope. Returns
    /// the list of existing candidates already bound to this name in this
    /// scope, for the caller to perform overload/redefinition checks.
    pub fn insert(&mut self, name: StringHandle, node: AstHandle) -> &[AstHandle] {
        let scope = self.scopes.last_mut().expect("scope stack non-empty");
        let entry = scope.names.entry(name).or_default();
        entry.push(node);
        entry.as_slice()
    }

    /// Walks outward from the current scope, returning the first scope's
    /// candidate list for `name` (innermost shadows outer).
    pub fn lookup_all(&self, name: StringHandle) -> Option<&[AstHandle]> {
        for scope in self.scopes.iter().rev() {
            if let Some(candidates) = scope.names.get(&name) {
                return Some(candidates.as_slice());
            }
        }
        None
    }

    /// Looks up `name` only within the innermost class scope enclosing the
    /// current position, used for access-control checks (spec §4.3).
    pub fn lookup_in_nearest_class(&self, name: StringHandle) -> Option<&[AstHandle]> {
        for scope in self.scopes.iter().rev() {
            if scope.kind == Some(ScopeKind::Class) {
                return scope.names.get(&name).map(|v| v.as_slice());
            }
        }
        None
    }

    pub fn nearest_class_depth(&self) -> Option<usize> {
        self.scopes
            .iter()
            .rposition(|s| s.kind == Some(ScopeKind::Class))
    }
}

pub struct ScopeGuard<'a> {
    table: &'a mut SymbolTable,
}

impl std::ops::Deref for ScopeGuard<'_> {
    type Target = SymbolTable;
    fn deref(&self) -> &SymbolTable {
        self.table
    }
}

impl std::ops::DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.table.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn inner_scope_shadows_outer() {
        let interner = Interner::new();
        let name = interner.intern("x");
        let mut table = SymbolTable::new();
        table.insert(name, 1);
        {
            let mut inner = table.scoped(ScopeKind::Block);
            inner.insert(name, 2);
            assert_eq!(inner.lookup_all(name), Some(&[2][..]));
        }
        assert_eq!(table.lookup_all(name), Some(&[1][..]));
    }

    #[test]
    fn scope_guard_pops_on_drop_even_on_early_return() {
        let mut table = SymbolTable::new();
        fn does_work(table: &mut SymbolTable) {
            let _g = table.scoped(ScopeKind::Function);
            if true {
                return; // guard still runs
            }
        }
        does_work(&mut table);
        assert_eq!(table.depth(), 1);
    }
}
