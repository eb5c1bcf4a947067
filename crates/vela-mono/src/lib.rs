//! The Monomorphizer (spec.md §4.4, §4.5): turns a normalized, possibly
//! generic [`vela_hir::hir::Module`] into a fully concrete [`MonoModule`]
//! by replaying the type checker's [`InstantiationMap`], substituting
//! generic parameters through the interned type graph, and rewriting
//! every call site to its resolved instance.
//!
//! Depends on `vela-hir` for the HIR it consumes and `vela-sema` for the
//! type interner and symbol table it consumes alongside it; nothing in
//! `vela-hir` or `vela-sema` depends back on this crate.

pub mod dump;
pub mod error;
pub mod instantiation;
pub mod module;
pub mod monomorphize;
pub mod options;
pub mod subst;

pub use dump::{dump_instantiation_map, dump_mono_module};
pub use error::{MonoError, MonoResult};
pub use instantiation::{args_key_from_types, InstEntry, InstKind, InstantiationMap, InstantiationRecorder, UseSite};
pub use module::{MonoFunc, MonoModule, MonoType};
pub use monomorphize::monomorphize_module;
pub use options::MonoOptions;
pub use subst::{substitute, Substitution};
