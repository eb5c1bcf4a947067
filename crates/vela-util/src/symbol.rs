//! String interning for identifiers, keywords and literal text.
//!
//! [`Symbol`] is a 4-byte handle into a global, thread-safe string table.
//! Interning makes symbol comparison an `O(1)` index comparison instead of a
//! string compare, which matters once the HIR carries thousands of
//! [`crate::DefId`]-keyed names through monomorphization.
//!
//! Known keywords and a handful of common identifiers are pre-interned at
//! fixed indices below [`RESERVED_SYMBOLS_END`] so they can be referred to as
//! `const`s without touching the table at runtime.
//!
//! ```
//! use vela_util::symbol::{Symbol, KW_FN};
//!
//! let a = Symbol::intern("fn");
//! assert_eq!(a, KW_FN);
//! assert_eq!(a.as_str(), "fn");
//! ```

use ahash::AHasher;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::LazyLock;

/// Index into the global string table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    index: u32,
}

/// Symbols below this index are pre-interned keywords/builtins with stable,
/// predictable values; everything at or above it was interned at runtime.
const RESERVED_SYMBOLS_END: u32 = 128;

macro_rules! known_symbols {
    ($($name:ident => $idx:expr, $text:expr;)*) => {
        $(pub const $name: Symbol = Symbol { index: $idx };)*

        const KNOWN_SYMBOL_TEXT: &[&str] = &[$($text),*];
    };
}

known_symbols! {
    KW_FN => 0, "fn";
    KW_LET => 1, "let";
    KW_CONST => 2, "const";
    KW_MUT => 3, "mut";
    KW_IF => 4, "if";
    KW_ELSE => 5, "else";
    KW_WHILE => 6, "while";
    KW_FOR => 7, "for";
    KW_LOOP => 8, "loop";
    KW_RETURN => 9, "return";
    KW_BREAK => 10, "break";
    KW_CONTINUE => 11, "continue";
    KW_MATCH => 12, "match";
    KW_STRUCT => 13, "struct";
    KW_ENUM => 14, "enum";
    KW_IMPL => 15, "impl";
    KW_TRAIT => 16, "trait";
    KW_TYPE => 17, "type";
    KW_MOD => 18, "mod";
    KW_USE => 19, "use";
    KW_PUB => 20, "pub";
    KW_SELF => 21, "self";
    KW_SELF_UPPER => 22, "Self";
    KW_AS => 23, "as";
    KW_TRUE => 24, "true";
    KW_FALSE => 25, "false";
    KW_ASYNC => 26, "async";
    KW_AWAIT => 27, "await";
    KW_SPAWN => 28, "spawn";
    KW_OWN => 29, "own";
    KW_FAILFAST => 30, "failfast";
    KW_OVERRIDE => 31, "override";
    TY_I8 => 32, "i8";
    TY_I16 => 33, "i16";
    TY_I32 => 34, "i32";
    TY_I64 => 35, "i64";
    TY_ISIZE => 36, "isize";
    TY_U8 => 37, "u8";
    TY_U16 => 38, "u16";
    TY_U32 => 39, "u32";
    TY_U64 => 40, "u64";
    TY_USIZE => 41, "usize";
    TY_F32 => 42, "f32";
    TY_F64 => 43, "f64";
    TY_BOOL => 44, "bool";
    TY_CHAR => 45, "char";
    TY_STR => 46, "str";
    ID_MAIN => 47, "main";
    ID_NEW => 48, "new";
    ID_DROP => 49, "drop";
    ID_CLONE => 50, "clone";
    ID_ITER => 51, "iter";
    ID_NEXT => 52, "next";
    ID_SELF_PARAM => 53, "self";
}

/// Thread-safe, append-only string table backing [`Symbol`].
///
/// Strings are leaked to obtain `'static` references; the table lives for
/// the process lifetime and never frees, which is acceptable for a
/// single-compilation process.
pub struct StringTable {
    map: DashMap<u64, (&'static str, u32)>,
    next_index: AtomicU32,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.initialize_known_symbols();
    table
});

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity(256),
            next_index: AtomicU32::new(RESERVED_SYMBOLS_END),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn initialize_known_symbols(&self) {
        for (idx, text) in KNOWN_SYMBOL_TEXT.iter().enumerate() {
            let idx = idx as u32;
            let leaked: &'static str = Box::leak(text.to_string().into_boxed_str());
            self.map.insert(Self::hash_string(text), (leaked, idx));
        }
    }

    fn hash_string(s: &str) -> u64 {
        let mut hasher = AHasher::default();
        s.hash(&mut hasher);
        hasher.finish()
    }

    pub fn intern(&self, s: &str) -> Symbol {
        let hash = Self::hash_string(s);
        if let Some(entry) = self.map.get(&hash) {
            if entry.value().0 == s {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Symbol { index: entry.value().1 };
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        match self.map.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(entry) if entry.get().0 == s => {
                Symbol { index: entry.get().1 }
            }
            _ => {
                let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
                let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
                self.map.insert(hash, (leaked, idx));
                Symbol { index: idx }
            }
        }
    }

    pub fn resolve(&self, symbol: Symbol) -> &'static str {
        if (symbol.index as usize) < KNOWN_SYMBOL_TEXT.len() {
            return KNOWN_SYMBOL_TEXT[symbol.index as usize];
        }
        self.map
            .iter()
            .find(|entry| entry.value().1 == symbol.index)
            .map(|entry| entry.value().0)
            .expect("symbol index not present in string table")
    }

    pub fn stats(&self) -> InternerStats {
        InternerStats {
            count: self.map.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of interner hit/miss counters, useful for diagnostics output.
#[derive(Clone, Copy, Debug, Default)]
pub struct InternerStats {
    pub count: usize,
    pub hits: usize,
    pub misses: usize,
}

impl InternerStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Symbol {
    pub fn intern(s: &str) -> Self {
        STRING_TABLE.intern(s)
    }

    pub fn as_str(&self) -> &'static str {
        STRING_TABLE.resolve(*self)
    }

    pub fn is_known(&self) -> bool {
        self.index < RESERVED_SYMBOLS_END
    }

    pub fn as_u32(&self) -> u32 {
        self.index
    }

    pub fn eq_str(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::intern(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_same_string_to_same_symbol() {
        let a = Symbol::intern("frobnicate");
        let b = Symbol::intern("frobnicate");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_get_distinct_symbols() {
        let a = Symbol::intern("alpha_unique_1");
        let b = Symbol::intern("beta_unique_2");
        assert_ne!(a, b);
    }

    #[test]
    fn known_keyword_is_stable() {
        assert_eq!(Symbol::intern("fn"), KW_FN);
        assert!(KW_FN.is_known());
        assert_eq!(KW_FN.as_str(), "fn");
    }

    #[test]
    fn runtime_symbol_is_not_known() {
        let s = Symbol::intern("some_user_identifier_xyz");
        assert!(!s.is_known());
    }

    #[test]
    fn display_matches_as_str() {
        let s = Symbol::intern("widget");
        assert_eq!(format!("{s}"), "widget");
    }
}
