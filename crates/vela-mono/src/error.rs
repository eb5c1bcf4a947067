//! `MonoError`: every fallible condition the monomorphizer can hit
//! (spec.md §7). Every other pass in the mid-end is total; this crate is
//! the one place the pipeline can genuinely fail, since an unbound
//! generic parameter or a missing `__clone` method is an upstream
//! invariant violation rather than a recoverable situation.

use thiserror::Error;
use vela_sema::{SymbolId, TypeId};

#[derive(Debug, Error)]
pub enum MonoError {
    #[error("symbol {symbol} is not generic but was instantiated with {got} type argument(s)")]
    NonGenericWithArgs { symbol: SymbolId, got: usize },

    #[error("symbol {symbol} expects {expected} type argument(s), got {got}")]
    WrongArity { symbol: SymbolId, expected: usize, got: usize },

    #[error("instantiation cycle detected for symbol {symbol} with args {args_key}: {stack:?}")]
    InstantiationCycle { symbol: SymbolId, args_key: String, stack: Vec<String> },

    #[error("instantiation depth exceeded limit of {limit}: {stack:?}")]
    DepthExceeded { limit: usize, stack: Vec<String> },

    #[error("unresolved generic parameter in type argument for symbol {symbol}: {stack:?}")]
    UnresolvedGenericParam { symbol: SymbolId, stack: Vec<String> },

    #[error("clone for {type_name} requires a __clone method")]
    MissingCloneMethod { type_name: String },

    #[error("residual generic parameter found in function {func} at type {type_id:?}")]
    ResidualGenericParam { func: SymbolId, type_id: TypeId },

    #[error("could not resolve callee for call at {site:?}")]
    UnresolvedCallee { site: vela_util::Span },
}

pub type MonoResult<T> = std::result::Result<T, MonoError>;
