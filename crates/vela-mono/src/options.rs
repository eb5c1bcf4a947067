//! Monomorphizer configuration (spec.md §6: `Options {max_depth, enable_dce}`).

/// Tunables for one [`crate::monomorphize::monomorphize_module`] call.
#[derive(Debug, Clone, Copy)]
pub struct MonoOptions {
    /// Instantiation-stack depth at which `ensure_func` gives up and
    /// returns [`crate::error::MonoError::DepthExceeded`].
    pub max_depth: usize,
    /// Whether to run dead-instance elimination after the five phases.
    pub enable_dce: bool,
}

impl Default for MonoOptions {
    fn default() -> Self {
        Self { max_depth: 64, enable_dce: true }
    }
}
