//! Data contracts the name resolver, type checker and borrow checker hand
//! to the mid-end (spec.md §6): `SymbolResult`, `SemaResult`, and the
//! `TypeInterner`/`Type` graph they're both built on.
//!
//! This crate implements none of those upstream passes — no inference, no
//! unification, no borrow checking. It only shapes their output so
//! `vela-hir` and `vela-mono` have something concrete to consume.

pub mod ids;
pub mod scope;
pub mod sema_result;
pub mod symbols;
pub mod types;

pub use ids::{BorrowId, ExprId, LocalId, ScopeId, SymbolId};
pub use scope::{Scope, ScopeKind, ScopeTree};
pub use sema_result::{BorrowEventKind, BorrowEventRaw, BorrowInfo, BorrowKind, ImplicitConversion, SemaResult};
pub use symbols::{FnSignature, SymbolEntry, SymbolKind, SymbolResult};
pub use types::{format_type, Type, TypeId, TypeInterner};
