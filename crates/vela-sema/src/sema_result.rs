//! `SemaResult`: the type checker's output (spec.md §6) — per-expression
//! types, implicit conversions, and the borrow-checker's raw event log,
//! all keyed for the HIR Lowerer and Borrow Lifter to consume directly.

use crate::ids::{BorrowId, ExprId, LocalId, ScopeId, SymbolId};
use crate::types::{Type, TypeId, TypeInterner};
use rustc_hash::FxHashMap;
use vela_util::Span;

/// One of the three implicit-conversion shapes the type checker may have
/// inserted at an expression (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplicitConversion {
    /// Wrap in `Some(expr)`.
    Some,
    /// Wrap in `Success(expr)`.
    Success,
    /// Insert an explicit cast to the target type.
    To(TypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowKind {
    Shared,
    Mut,
}

/// One relationship between a borrower binding and the place it borrows
/// from, as recorded by the borrow checker — consumed by the Borrow
/// Lifter to build each function's `BorrowEdge` list (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct BorrowInfo {
    pub borrower: LocalId,
    pub place_base: LocalId,
    pub kind: BorrowKind,
    pub span: Span,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowEventKind {
    BorrowStart,
    BorrowEnd,
    Move,
    Write,
    Read,
    Drop,
    SpawnEscape,
}

/// One entry of the borrow checker's event log, in emission order. The
/// Borrow Lifter replays these in order to build each function's
/// `BorrowGraph`/`MovePlan` (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct BorrowEventRaw {
    pub id: BorrowId,
    pub kind: BorrowEventKind,
    pub local: LocalId,
    pub peer: Option<LocalId>,
    pub span: Span,
    pub scope: ScopeId,
    /// Present on a `Move`/`Write` the checker already rejected; the
    /// Borrow Lifter folds this straight into `MoveInfo::forbidden`.
    pub blocked_reason: Option<String>,
}

/// Everything the type checker hands to the HIR Lowerer and Borrow
/// Lifter: per-expression types, per-binding types, implicit conversions,
/// per-item scopes, the borrow-info/event log, the shared `TypeInterner`,
/// and the `clone`-dispatch and copy-type predicates.
#[derive(Default)]
pub struct SemaResult {
    pub interner: TypeInterner,
    expr_types: FxHashMap<ExprId, TypeId>,
    binding_types: FxHashMap<LocalId, TypeId>,
    implicit_conversions: FxHashMap<ExprId, ImplicitConversion>,
    item_scopes: FxHashMap<SymbolId, ScopeId>,
    pub borrow_infos: Vec<BorrowInfo>,
    pub borrow_events: Vec<BorrowEventRaw>,
    borrow_bindings: FxHashMap<LocalId, Vec<BorrowId>>,
    clone_symbols: FxHashMap<ExprId, SymbolId>,
}

impl SemaResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expr_type(&mut self, expr: ExprId, ty: TypeId) {
        self.expr_types.insert(expr, ty);
    }

    /// Returns [`TypeId::NONE`] if the checker never assigned a type —
    /// the lowerer propagates that sentinel rather than guessing (§4.1).
    pub fn type_of_expr(&self, expr: ExprId) -> TypeId {
        self.expr_types.get(&expr).copied().unwrap_or(TypeId::NONE)
    }

    pub fn set_binding_type(&mut self, local: LocalId, ty: TypeId) {
        self.binding_types.insert(local, ty);
    }

    pub fn type_of_binding(&self, local: LocalId) -> TypeId {
        self.binding_types.get(&local).copied().unwrap_or(TypeId::NONE)
    }

    pub fn set_implicit_conversion(&mut self, expr: ExprId, conversion: ImplicitConversion) {
        self.implicit_conversions.insert(expr, conversion);
    }

    pub fn implicit_conversion_of(&self, expr: ExprId) -> Option<&ImplicitConversion> {
        self.implicit_conversions.get(&expr)
    }

    pub fn set_item_scope(&mut self, item: SymbolId, scope: ScopeId) {
        self.item_scopes.insert(item, scope);
    }

    pub fn scope_of_item(&self, item: SymbolId) -> Option<ScopeId> {
        self.item_scopes.get(&item).copied()
    }

    pub fn bind_borrow_event(&mut self, local: LocalId, event: BorrowId) {
        self.borrow_bindings.entry(local).or_default().push(event);
    }

    pub fn borrow_events_for(&self, local: LocalId) -> &[BorrowId] {
        self.borrow_bindings.get(&local).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_clone_symbol(&mut self, expr: ExprId, method: SymbolId) {
        self.clone_symbols.insert(expr, method);
    }

    pub fn clone_symbol_for(&self, expr: ExprId) -> Option<SymbolId> {
        self.clone_symbols.get(&expr).copied()
    }

    /// True for the primitive copy types the Ownership classifier treats
    /// as `Copy` (spec.md §4.6) — also what the lowerer's `clone`
    /// intrinsic reduction checks (§4.1).
    pub fn is_copy_type(&self, ty: TypeId) -> bool {
        matches!(self.interner.get(ty), t if t.is_copy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_util::DefId;

    #[test]
    fn missing_expr_type_defaults_to_none_sentinel() {
        let result = SemaResult::new();
        assert_eq!(result.type_of_expr(ExprId(0)), TypeId::NONE);
    }

    #[test]
    fn is_copy_type_reflects_underlying_type() {
        let mut result = SemaResult::new();
        let int_ty = result.interner.intern(Type::Int64);
        let string_ty = result.interner.intern(Type::String);
        assert!(result.is_copy_type(int_ty));
        assert!(!result.is_copy_type(string_ty));
    }

    #[test]
    fn clone_symbol_lookup_round_trips() {
        let mut result = SemaResult::new();
        result.set_clone_symbol(ExprId(3), DefId(42));
        assert_eq!(result.clone_symbol_for(ExprId(3)), Some(DefId(42)));
        assert_eq!(result.clone_symbol_for(ExprId(4)), None);
    }
}
