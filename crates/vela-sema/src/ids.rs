//! Identifier newtypes for the name-resolver/type-checker artifacts this
//! crate models. `SymbolId` and `LocalId` both reuse [`vela_util::DefId`]
//! per spec.md §3 ("`LocalID` = `SymbolID` reuse").

use vela_util::{DefId, Idx};

pub type SymbolId = DefId;
pub type LocalId = DefId;

/// Identifies one AST/HIR expression; keys the per-expression type and
/// implicit-conversion maps in [`crate::SemaResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl Idx for ExprId {
    fn from_usize(idx: usize) -> Self {
        ExprId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lexical scope assigned by the name resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl Idx for ScopeId {
    fn from_usize(idx: usize) -> Self {
        ScopeId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One borrow recorded by the type checker's borrow-event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BorrowId(pub u32);

impl Idx for BorrowId {
    fn from_usize(idx: usize) -> Self {
        BorrowId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}
