//! `SymbolResult`: the name-resolver's output, as consumed by the HIR
//! Lowerer and the Monomorphizer (spec.md §6). Population is the
//! resolver's job — an external collaborator — this crate only shapes
//! the arena it hands over.

use crate::ids::SymbolId;
use crate::scope::ScopeTree;
use crate::types::TypeId;
use rustc_hash::FxHashMap;
use vela_util::{IndexVec, Span, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Tag,
    Type,
    Param,
    Value,
    Module,
    Const,
}

/// A function symbol's call shape, used by the lowerer's variadic-argument
/// collection (§4.1) and by the monomorphizer's arity checks (§4.5).
#[derive(Debug, Clone)]
pub struct FnSignature {
    pub param_types: Vec<TypeId>,
    pub param_has_default: Vec<bool>,
    pub variadic: bool,
    pub has_self: bool,
}

impl FnSignature {
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: Symbol,
    pub kind: SymbolKind,
    pub declared_type: TypeId,
    /// Names of this symbol's own generic parameters, in declaration order.
    pub type_params: Vec<Symbol>,
    pub signature: Option<FnSignature>,
    /// The nominal type this is a method of, if any — matched against a
    /// call's concrete receiver type during method-call rewriting.
    pub receiver_key: Option<TypeId>,
    pub decl_span: Span,
}

impl SymbolEntry {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// Arena of every symbol the name resolver produced, plus the lexical
/// scope tree, and a method-dispatch index keyed by receiver type.
pub struct SymbolResult {
    entries: IndexVec<SymbolId, SymbolEntry>,
    pub scopes: ScopeTree,
    methods_by_receiver: FxHashMap<TypeId, Vec<SymbolId>>,
}

impl SymbolResult {
    pub fn new() -> Self {
        Self { entries: IndexVec::new(), scopes: ScopeTree::new(), methods_by_receiver: FxHashMap::default() }
    }

    pub fn define(&mut self, entry: SymbolEntry) -> SymbolId {
        let receiver = entry.receiver_key;
        let id = self.entries.push(entry);
        if let Some(receiver) = receiver {
            self.methods_by_receiver.entry(receiver).or_default().push(id);
        }
        id
    }

    pub fn get(&self, id: SymbolId) -> &SymbolEntry {
        self.entries.get(id).expect("SymbolId not present in this SymbolResult")
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolEntry)> {
        self.entries.iter_enumerated()
    }

    /// Methods declared with `receiver` as their receiver type, in
    /// declaration order — used when rewriting a bound method call (§4.1,
    /// §4.5 step 1) to find the matching direct-call target.
    pub fn methods_for_receiver(&self, receiver: TypeId) -> &[SymbolId] {
        self.methods_by_receiver.get(&receiver).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for SymbolResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_util::Span;

    fn dummy_entry(name: &str, kind: SymbolKind, receiver: Option<TypeId>) -> SymbolEntry {
        SymbolEntry {
            name: Symbol::intern(name),
            kind,
            declared_type: TypeId::NONE,
            type_params: Vec::new(),
            signature: None,
            receiver_key: receiver,
            decl_span: Span::DUMMY,
        }
    }

    #[test]
    fn methods_for_receiver_indexes_by_receiver_type() {
        let mut result = SymbolResult::new();
        let vec_ty = TypeId(5);
        let len_id = result.define(dummy_entry("len", SymbolKind::Function, Some(vec_ty)));
        result.define(dummy_entry("push", SymbolKind::Function, Some(vec_ty)));
        result.define(dummy_entry("main", SymbolKind::Function, None));

        let methods = result.methods_for_receiver(vec_ty);
        assert_eq!(methods.len(), 2);
        assert!(methods.contains(&len_id));
    }

    #[test]
    fn is_generic_reflects_type_params() {
        let mut entry = dummy_entry("id", SymbolKind::Function, None);
        assert!(!entry.is_generic());
        entry.type_params.push(Symbol::intern("T"));
        assert!(entry.is_generic());
    }
}
