//! Instantiation Map (spec.md §4.4): the type checker's record of every
//! concrete type-argument list a generic symbol was actually called with,
//! replayed by the Monomorphizer's Phase 1 indexing step and Phase 3
//! seeding step.

use rustc_hash::FxHashMap;
use vela_sema::{SymbolId, TypeId};
use vela_util::Span;

/// Which namespace a recorded instantiation belongs to. Ordering matches
/// the dump format's `fn|type|tag` line prefix (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstKind {
    Fn,
    Type,
    Tag,
}

impl InstKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InstKind::Fn => "fn",
            InstKind::Type => "type",
            InstKind::Tag => "tag",
        }
    }
}

/// One recorded use of an instantiation, as seen at a particular call/type
/// site. `caller` is `None` for a use site outside any function body
/// (module-level const/global initializers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    pub span: Span,
    pub caller: Option<SymbolId>,
    pub note: Option<String>,
}

/// Stable string form of a normalized `TypeID` list: decimal ids joined by
/// `#` (spec.md §4.4). Two element-wise-`TypeId`-equal lists always
/// produce the same key; any two different lists never do (spec.md §8
/// property 9) — both follow directly from `TypeId` being a plain `u32`
/// newtype with no two distinct ids ever formatting the same.
pub fn args_key_from_types(type_args: &[TypeId]) -> String {
    type_args.iter().map(|t| t.0.to_string()).collect::<Vec<_>>().join("#")
}

#[derive(Debug, Clone)]
pub struct InstEntry {
    pub kind: InstKind,
    pub symbol: SymbolId,
    pub type_args: Vec<TypeId>,
    pub use_sites: Vec<UseSite>,
}

impl InstEntry {
    pub fn args_key(&self) -> String {
        args_key_from_types(&self.type_args)
    }
}

/// Keyed by `(symbol, args_key)` per spec.md §3. The type checker is the
/// only writer; the Monomorphizer only ever reads it back through
/// [`InstantiationMap::entries_sorted`] / [`InstantiationMap::get`].
#[derive(Default)]
pub struct InstantiationMap {
    entries: FxHashMap<(SymbolId, String), InstEntry>,
}

impl InstantiationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insertion: recording the same `(symbol, args_key)` twice
    /// merges into the existing entry's `use_sites`, folding an exact
    /// span/caller/note duplicate rather than appending it again.
    pub fn record(
        &mut self,
        kind: InstKind,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    ) {
        let key = (symbol, args_key_from_types(&type_args));
        let use_site = UseSite { span: site, caller, note };
        let entry = self.entries.entry(key).or_insert_with(|| InstEntry {
            kind,
            symbol,
            type_args,
            use_sites: Vec::new(),
        });
        if !entry.use_sites.contains(&use_site) {
            entry.use_sites.push(use_site);
        }
    }

    pub fn get(&self, symbol: SymbolId, args_key: &str) -> Option<&InstEntry> {
        self.entries.get(&(symbol, args_key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, sorted by `(kind, symbol, args key)` per spec.md §5's
    /// ordering guarantee — the order Phase 3 seeding and the dump format
    /// both rely on.
    pub fn entries_sorted(&self) -> Vec<&InstEntry> {
        let mut out: Vec<&InstEntry> = self.entries.values().collect();
        out.sort_by(|a, b| (a.kind, a.symbol, a.args_key()).cmp(&(b.kind, b.symbol, b.args_key())));
        out
    }
}

/// The three-method recording surface the type checker drives (spec.md
/// §4.4). A thin trait over [`InstantiationMap`] so callers can record
/// without caring whether they hold the concrete map or a test double.
pub trait InstantiationRecorder {
    fn record_fn(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    );
    fn record_type(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    );
    fn record_tag(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    );
}

impl InstantiationRecorder for InstantiationMap {
    fn record_fn(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    ) {
        self.record(InstKind::Fn, symbol, type_args, site, caller, note);
    }

    fn record_type(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    ) {
        self.record(InstKind::Type, symbol, type_args, site, caller, note);
    }

    fn record_tag(
        &mut self,
        symbol: SymbolId,
        type_args: Vec<TypeId>,
        site: Span,
        caller: Option<SymbolId>,
        note: Option<String>,
    ) {
        self.record(InstKind::Tag, symbol, type_args, site, caller, note);
    }
}
