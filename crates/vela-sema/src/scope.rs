//! Lexical scope tree produced by the name resolver (an external
//! collaborator per spec.md §1). Carried here only as a data shape:
//! `SymbolResult` exposes a `scope_of(ExprId/item)` lookup into this tree,
//! but nothing in this crate performs resolution.

use crate::ids::ScopeId;
use rustc_hash::FxHashMap;
use vela_util::{DefId, Idx, IndexVec, Symbol};

#[derive(Debug, Clone, Copy)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
    Loop,
}

#[derive(Debug)]
pub struct Scope {
    pub bindings: FxHashMap<Symbol, DefId>,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
}

/// Chain of lexical scopes ("ribs"), each pointing at its parent, with
/// name lookup walking outward until a binding or the module root is hit.
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    root: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        let root = scopes.push(Scope { bindings: FxHashMap::default(), parent: None, kind: ScopeKind::Module });
        Self { scopes, root }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        self.scopes.push(Scope { bindings: FxHashMap::default(), parent: Some(parent), kind })
    }

    pub fn bind(&mut self, scope: ScopeId, name: Symbol, def_id: DefId) {
        self.scopes[scope].bindings.insert(name, def_id);
    }

    /// Resolves `name` starting at `scope`, walking out through parents.
    pub fn resolve(&self, scope: ScopeId, name: Symbol) -> Option<DefId> {
        let mut current = scope;
        loop {
            let entry = &self.scopes[current];
            if let Some(&def_id) = entry.bindings.get(&name) {
                return Some(def_id);
            }
            current = entry.parent?;
        }
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_walks_up_to_parent_scope() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.bind(root, Symbol::intern("outer"), DefId(1));

        let inner = tree.push_scope(root, ScopeKind::Function);
        tree.bind(inner, Symbol::intern("inner"), DefId(2));

        assert_eq!(tree.resolve(inner, Symbol::intern("inner")), Some(DefId(2)));
        assert_eq!(tree.resolve(inner, Symbol::intern("outer")), Some(DefId(1)));
        assert_eq!(tree.resolve(inner, Symbol::intern("missing")), None);
    }

    #[test]
    fn shadowing_prefers_innermost_binding() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.bind(root, Symbol::intern("x"), DefId(10));
        let inner = tree.push_scope(root, ScopeKind::Block);
        tree.bind(inner, Symbol::intern("x"), DefId(20));

        assert_eq!(tree.resolve(inner, Symbol::intern("x")), Some(DefId(20)));
        assert_eq!(tree.resolve(root, Symbol::intern("x")), Some(DefId(10)));
    }
}
