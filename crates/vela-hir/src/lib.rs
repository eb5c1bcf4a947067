//! HIR construction, normalization and the Borrow Lifter (spec.md §4.1,
//! §4.2, §4.3): the first two pipeline stages of the mid-end, producing a
//! [`hir::Module`] whose functions use only the reduced primitive
//! construct set and already carry a per-function [`borrow::BorrowGraph`]
//! and [`borrow::MovePlan`].
//!
//! `vela_mono` consumes this crate's [`hir::Module`] directly; neither
//! crate depends on the other.

pub mod borrow;
pub mod hir;
pub mod lower;
pub mod normalize;
pub mod ownership;

pub use borrow::{BorrowEdge, BorrowEvent, BorrowGraph, EdgeKind, MoveInfo, MovePlan, MovePolicy};
pub use hir::{Block, Expr, ExprKind, Func, FuncFlags, FuncId, Module, Ownership, Stmt};
pub use lower::lower_module;
pub use ownership::classify;
