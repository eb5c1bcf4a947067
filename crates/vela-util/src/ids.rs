//! [`DefId`]: a stable, globally unique identifier for every definition a
//! name resolver produces (functions, types, locals, tags). HIR, the
//! instantiation map and the monomorphizer all key off `DefId` rather than
//! names, since names can shadow and generic instances need identities of
//! their own.

use crate::index_vec::Idx;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefId(pub u32);

impl Idx for DefId {
    fn from_usize(idx: usize) -> Self {
        DefId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl DefId {
    /// Sentinel for "no definition" / unresolved cases the type checker
    /// already reported; never produced by [`DefIdGenerator`].
    pub const DUMMY: DefId = DefId(u32::MAX);

    pub fn is_dummy(self) -> bool {
        self == Self::DUMMY
    }

    /// High-bit-prefixed id marking a monomorphized function instance,
    /// disjoint from every resolver-assigned `DefId`.
    pub const INSTANCE_FUNC_PREFIX: u32 = 0x8000_0000;

    /// High-bit-prefixed id marking a monomorphized instance's symbol,
    /// disjoint from both resolver ids and [`Self::INSTANCE_FUNC_PREFIX`].
    pub const INSTANCE_SYMBOL_PREFIX: u32 = 0x9000_0000;

    pub fn is_instance_func(self) -> bool {
        self.0 & 0xF000_0000 == Self::INSTANCE_FUNC_PREFIX
    }

    pub fn is_instance_symbol(self) -> bool {
        self.0 & 0xF000_0000 == Self::INSTANCE_SYMBOL_PREFIX
    }
}

impl std::fmt::Display for DefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out sequential `DefId`s; one generator per compilation.
pub struct DefIdGenerator {
    counter: AtomicU32,
}

impl DefIdGenerator {
    pub fn new() -> Self {
        Self { counter: AtomicU32::new(0) }
    }

    pub fn next(&self) -> DefId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        assert!(id < DefId::INSTANCE_FUNC_PREFIX, "DefId overflow into reserved instance space");
        DefId(id)
    }
}

impl Default for DefIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out `DefId`s in the high-bit-prefixed instance-function space, so
/// monomorphized function ids never collide with a resolver-assigned one.
pub struct InstanceFuncIdGenerator {
    counter: AtomicU32,
}

impl InstanceFuncIdGenerator {
    pub fn new() -> Self {
        Self { counter: AtomicU32::new(DefId::INSTANCE_FUNC_PREFIX) }
    }

    pub fn next(&self) -> DefId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        assert!(id < DefId::INSTANCE_SYMBOL_PREFIX, "instance function id overflow");
        DefId(id)
    }
}

impl Default for InstanceFuncIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out `DefId`s in the high-bit-prefixed instance-symbol space, so a
/// monomorphized function's own symbol id never collides with either a
/// resolver-assigned one or its instance function id.
pub struct InstanceSymbolIdGenerator {
    counter: AtomicU32,
}

impl InstanceSymbolIdGenerator {
    pub fn new() -> Self {
        Self { counter: AtomicU32::new(DefId::INSTANCE_SYMBOL_PREFIX) }
    }

    pub fn next(&self) -> DefId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        assert!(id & 0xF000_0000 == DefId::INSTANCE_SYMBOL_PREFIX, "instance symbol id overflow");
        DefId(id)
    }
}

impl Default for InstanceSymbolIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
