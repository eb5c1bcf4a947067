//! `MonoModule`/`MonoFunc`/`MonoType` (spec.md §3): the Monomorphizer's
//! output. Every `MonoFunc` wraps a fully concrete [`vela_hir::Func`] —
//! generics stripped, symbol rewritten to its instance symbol — so the
//! rest of the toolchain (a future codegen stage, the dump formats here)
//! can keep walking plain HIR.

use rustc_hash::FxHashMap;
use vela_hir::hir;
use vela_sema::{SymbolId, TypeId};
use vela_util::DefId;

use crate::instantiation::args_key_from_types;

/// One monomorphized function instance.
#[derive(Debug, Clone)]
pub struct MonoFunc {
    /// Fresh id from the `0x8000_0000` instance-function space.
    pub instance_id: DefId,
    /// The generic function this was cloned from.
    pub original_symbol: SymbolId,
    /// Concrete type arguments this instance was built with.
    pub type_args: Vec<TypeId>,
    /// The cloned, substituted, generics-stripped body. `func.symbol` is
    /// the fresh instance symbol (`0x9000_0000` space); `func.generics`
    /// is always empty.
    pub func: hir::Func,
}

impl MonoFunc {
    pub fn instance_symbol(&self) -> SymbolId {
        self.func.symbol
    }

    pub fn args_key(&self) -> String {
        args_key_from_types(&self.type_args)
    }
}

/// One monomorphized nominal-type instance (a concrete `Struct`/`Union`/
/// `Alias` registered in the shared `TypeInterner`).
#[derive(Debug, Clone, Copy)]
pub struct MonoType {
    pub type_id: TypeId,
}

/// The Monomorphizer's output for one source module (spec.md §3).
/// `source` is the original, still-generic `Module` — retained for
/// provenance per spec.md §5's memory-discipline note, never mutated.
pub struct MonoModule {
    pub source: hir::Module,
    funcs: FxHashMap<DefId, MonoFunc>,
    funcs_by_key: FxHashMap<(SymbolId, String), DefId>,
    by_instance_sym: FxHashMap<DefId, DefId>,
    types: FxHashMap<(SymbolId, String), MonoType>,
}

impl MonoModule {
    pub fn new(source: hir::Module) -> Self {
        Self {
            source,
            funcs: FxHashMap::default(),
            funcs_by_key: FxHashMap::default(),
            by_instance_sym: FxHashMap::default(),
            types: FxHashMap::default(),
        }
    }

    /// Registers a freshly built instance. Panics on a duplicate
    /// `(original_symbol, args_key)` — `ensure_func`'s memoization check
    /// is the only caller and must have already ruled that out.
    pub fn insert_func(&mut self, func: MonoFunc) -> DefId {
        let key = (func.original_symbol, func.args_key());
        let instance_id = func.instance_id;
        let instance_sym = func.instance_symbol();
        assert!(!self.funcs_by_key.contains_key(&key), "duplicate MonoFunc key {:?}", key);
        self.funcs_by_key.insert(key, instance_id);
        self.by_instance_sym.insert(instance_sym, instance_id);
        self.funcs.insert(instance_id, func);
        instance_id
    }

    pub fn get_func_by_key(&self, original_symbol: SymbolId, args_key: &str) -> Option<&MonoFunc> {
        self.funcs_by_key.get(&(original_symbol, args_key.to_string())).and_then(|id| self.funcs.get(id))
    }

    pub fn get_func(&self, instance_id: DefId) -> Option<&MonoFunc> {
        self.funcs.get(&instance_id)
    }

    pub fn get_func_by_instance_symbol(&self, instance_sym: SymbolId) -> Option<&MonoFunc> {
        self.by_instance_sym.get(&instance_sym).and_then(|id| self.funcs.get(id))
    }

    pub fn insert_type(&mut self, original_type_symbol: SymbolId, type_args: &[TypeId], ty: MonoType) {
        self.types.insert((original_type_symbol, args_key_from_types(type_args)), ty);
    }

    pub fn has_type(&self, original_type_symbol: SymbolId, type_args: &[TypeId]) -> bool {
        self.types.contains_key(&(original_type_symbol, args_key_from_types(type_args)))
    }

    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Every function, sorted by instance id — the Dead-instance
    /// elimination pass and both dump formats need a stable order
    /// (spec.md §5).
    pub fn funcs_sorted(&self) -> Vec<&MonoFunc> {
        let mut out: Vec<&MonoFunc> = self.funcs.values().collect();
        out.sort_by_key(|f| f.instance_id);
        out
    }

    pub fn types_sorted(&self) -> Vec<(&(SymbolId, String), &MonoType)> {
        let mut out: Vec<_> = self.types.iter().collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Retains only the functions whose instance id is in `keep`, used by
    /// dead-instance elimination. Rebuilds every index, including `types`
    /// (spec.md §4.5: "rebuild `Types` from the retained functions").
    pub fn retain_funcs(&mut self, keep: &std::collections::HashSet<DefId>) {
        self.funcs.retain(|id, _| keep.contains(id));
        self.funcs_by_key.retain(|_, id| keep.contains(id));
        self.by_instance_sym.retain(|_, id| keep.contains(id));
    }

    pub fn clear_types(&mut self) {
        self.types.clear();
    }
}
