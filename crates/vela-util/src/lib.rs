//! Shared low-level utilities used throughout the mid-end: symbol
//! interning, source spans, typed-index arenas, definition ids and
//! diagnostic reporting. Everything else in the workspace (`vela-ast`,
//! `vela-sema`, `vela-hir`, `vela-mono`) builds on this crate.

pub mod diagnostic;
pub mod error;
pub mod ids;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Handler, Level, SourceSnippet};
pub use ids::{DefId, DefIdGenerator, InstanceFuncIdGenerator, InstanceSymbolIdGenerator};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceFile, SourceMap, Span};
pub use symbol::Symbol;
