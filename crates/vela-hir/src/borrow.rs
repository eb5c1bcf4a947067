//! Borrow lifter (spec.md §4.3): turns the type checker's flat
//! `BorrowInfo`/`BorrowEventRaw` log into a per-function `BorrowGraph`
//! and `MovePlan`.

use crate::hir::{visit_exprs_in_block, Block, Func, Ownership};
use crate::ownership::classify;
use rustc_hash::FxHashMap;
use vela_sema::{BorrowEventKind, BorrowEventRaw, BorrowId, BorrowInfo, BorrowKind, LocalId, ScopeId, SemaResult};
use vela_util::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Shared,
    Mut,
}

impl From<BorrowKind> for EdgeKind {
    fn from(k: BorrowKind) -> Self {
        match k {
            BorrowKind::Shared => EdgeKind::Shared,
            BorrowKind::Mut => EdgeKind::Mut,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BorrowEdge {
    pub from: LocalId,
    pub to: LocalId,
    pub kind: EdgeKind,
    pub span: Span,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowEventKindLifted {
    BorrowStart,
    BorrowEnd,
    Move,
    Write,
    Read,
    Drop,
    SpawnEscape,
}

impl From<BorrowEventKind> for BorrowEventKindLifted {
    fn from(k: BorrowEventKind) -> Self {
        match k {
            BorrowEventKind::BorrowStart => BorrowEventKindLifted::BorrowStart,
            BorrowEventKind::BorrowEnd => BorrowEventKindLifted::BorrowEnd,
            BorrowEventKind::Move => BorrowEventKindLifted::Move,
            BorrowEventKind::Write => BorrowEventKindLifted::Write,
            BorrowEventKind::Read => BorrowEventKindLifted::Read,
            BorrowEventKind::Drop => BorrowEventKindLifted::Drop,
            BorrowEventKind::SpawnEscape => BorrowEventKindLifted::SpawnEscape,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BorrowEvent {
    pub id: BorrowId,
    pub kind: BorrowEventKindLifted,
    pub local: LocalId,
    pub peer: Option<LocalId>,
    pub span: Span,
    pub scope: ScopeId,
    pub note: Option<String>,
}

/// A function's borrow relationships: the edge list plus in/out adjacency
/// indices (spec.md §3). Left `None` on a monomorphized clone — cloning
/// specializes types, which invalidates the analysis done against the
/// generic original (spec.md §4.5 step 2).
#[derive(Debug, Clone)]
pub struct BorrowGraph {
    pub func: crate::hir::FuncId,
    pub edges: Vec<BorrowEdge>,
    pub events: Vec<BorrowEvent>,
    pub in_edges: FxHashMap<LocalId, Vec<usize>>,
    pub out_edges: FxHashMap<LocalId, Vec<usize>>,
}

impl BorrowGraph {
    fn new(func: crate::hir::FuncId) -> Self {
        Self { func, edges: Vec::new(), events: Vec::new(), in_edges: FxHashMap::default(), out_edges: FxHashMap::default() }
    }

    fn push_edge(&mut self, edge: BorrowEdge) {
        let idx = self.edges.len();
        self.out_edges.entry(edge.from).or_default().push(idx);
        self.in_edges.entry(edge.to).or_default().push(idx);
        self.edges.push(edge);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePolicy {
    Unknown,
    Copy,
    Allowed,
    Forbidden,
    NeedsDrop,
}

#[derive(Debug, Clone)]
pub struct MoveInfo {
    pub policy: MovePolicy,
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovePlan {
    pub locals: FxHashMap<LocalId, MoveInfo>,
}

impl MovePlan {
    pub fn get(&self, local: LocalId) -> Option<&MoveInfo> {
        self.locals.get(&local)
    }
}

/// Collects the set of locals "owned" by `func`: its parameter symbols
/// plus every `let` binding reachable in its body (spec.md §4.3 step 1).
fn locals_of(func: &Func) -> std::collections::HashSet<LocalId> {
    let mut locals: std::collections::HashSet<LocalId> = func.params.iter().map(|p| p.symbol).collect();
    collect_let_locals(&func.body, &mut locals);
    locals
}

fn collect_let_locals(block: &Block, out: &mut std::collections::HashSet<LocalId>) {
    use crate::hir::Stmt;
    for stmt in &block.stmts {
        match stmt {
            Stmt::Let { symbol, .. } => {
                out.insert(*symbol);
            }
            Stmt::If { then_block, else_block, .. } => {
                collect_let_locals(then_block, out);
                if let Some(b) = else_block {
                    collect_let_locals(b, out);
                }
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } | Stmt::Block(body) => collect_let_locals(body, out),
            _ => {}
        }
        // `let`-bound loop variables introduced by a pre-normalization `For`
        // live inside `ForKind`, not as a `Stmt::Let` — recorded separately
        // since normalization rewrites them into real `Let`s anyway.
    }
}

fn ownership_for_local(func: &Func, local: LocalId, interner: &vela_sema::TypeInterner, sema: &SemaResult) -> Ownership {
    for p in &func.params {
        if p.symbol == local {
            return p.ownership;
        }
    }
    classify(interner, sema.type_of_binding(local))
}

/// Runs the Borrow Lifter over one function, consuming the flat
/// `borrow_infos`/`borrow_events` recorded on `sema` and producing the
/// graph and move plan (spec.md §4.3).
pub fn lift(func: &Func, sema: &SemaResult) -> (BorrowGraph, MovePlan) {
    let owned = locals_of(func);
    let mut graph = BorrowGraph::new(func.id);

    for info in &sema.borrow_infos {
        if owned.contains(&info.borrower) || owned.contains(&info.place_base) {
            graph.push_edge(BorrowEdge {
                from: info.borrower,
                to: info.place_base,
                kind: info.kind.into(),
                span: info.span,
                scope: info.scope,
            });
        }
    }

    for event in &sema.borrow_events {
        if !owned.contains(&event.local) && !event.peer.map(|p| owned.contains(&p)).unwrap_or(false) {
            continue;
        }
        graph.events.push(lift_event(event));
    }

    let mut plan = MovePlan::default();
    for &local in &owned {
        let ownership = ownership_for_local(func, local, &sema.interner, sema);
        let ty = sema.type_of_binding(local);
        let is_generic_param = ty != vela_sema::TypeId::NONE && sema.interner.get(ty).contains_generic_param(&sema.interner);
        let mut info = default_move_info(ownership, is_generic_param, sema.is_copy_type(ty));
        apply_blocking_events(&mut info, &sema.borrow_events, local);
        plan.locals.insert(local, info);
    }

    (graph, plan)
}

fn lift_event(raw: &BorrowEventRaw) -> BorrowEvent {
    BorrowEvent {
        id: raw.id,
        kind: raw.kind.into(),
        local: raw.local,
        peer: raw.peer,
        span: raw.span,
        scope: raw.scope,
        note: raw.blocked_reason.clone(),
    }
}

/// `is_copy_type` is consulted before falling back to `Ownership` alone:
/// pointers and function values (spec.md §4.3 step 4) classify as
/// `Ownership::Ptr`/`Ownership::None` respectively, but a bare `Ownership`
/// match can't tell a function value apart from a real owned local that
/// needs a drop, so `SemaResult::is_copy_type` — which does know about
/// `Type::Fn` — gets the first word.
fn default_move_info(ownership: Ownership, is_generic_param: bool, is_copy_type: bool) -> MoveInfo {
    if is_generic_param {
        return MoveInfo { policy: MovePolicy::Unknown, why: None };
    }
    if is_copy_type {
        return MoveInfo { policy: MovePolicy::Copy, why: None };
    }
    match ownership {
        Ownership::Copy | Ownership::Ptr => MoveInfo { policy: MovePolicy::Copy, why: None },
        Ownership::Ref | Ownership::RefMut => MoveInfo { policy: MovePolicy::Allowed, why: None },
        Ownership::None => MoveInfo { policy: MovePolicy::NeedsDrop, why: None },
        Ownership::Own => MoveInfo { policy: MovePolicy::NeedsDrop, why: None },
    }
}

fn apply_blocking_events(info: &mut MoveInfo, events: &[BorrowEventRaw], local: LocalId) {
    for event in events {
        if event.local != local {
            continue;
        }
        match event.kind {
            BorrowEventKind::SpawnEscape => {
                info.policy = MovePolicy::Forbidden;
                info.why = Some("task escape".to_string());
            }
            BorrowEventKind::Move | BorrowEventKind::Write => {
                if let Some(reason) = &event.blocked_reason {
                    info.policy = MovePolicy::Forbidden;
                    info.why = Some(reason.clone());
                }
            }
            _ => {}
        }
    }
}

/// True if `body` contains any expression classified as a clone-intrinsic
/// call against a copy-typed receiver — used by the lowerer's clone
/// reduction (spec.md §4.1), kept here since it shares the `Ownership`
/// classifier.
pub fn is_copy_clone_call(interner: &vela_sema::TypeInterner, receiver_ty: vela_sema::TypeId) -> bool {
    matches!(classify(interner, receiver_ty), Ownership::Copy)
}

/// Ensures `block`'s exprs are reachable for a caller that wants to reuse
/// the shared traversal rather than hand-rolling recursion again.
pub fn walk(block: &Block, mut f: impl FnMut(&crate::hir::Expr)) {
    visit_exprs_in_block(block, &mut f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{Block, FuncFlags, FuncId, Ownership, Param};
    use vela_util::{DefId, Span};

    fn empty_func(id: u32, param_symbol: DefId) -> Func {
        Func {
            id: FuncId(id),
            name: vela_util::Symbol::intern("f"),
            symbol: DefId(100),
            span: Span::DUMMY,
            generics: vec![],
            params: vec![Param {
                name: vela_util::Symbol::intern("x"),
                symbol: param_symbol,
                ty: vela_sema::TypeId::NONE,
                ownership: Ownership::Copy,
                default: None,
                has_default: false,
            }],
            result: vela_sema::TypeId::NONE,
            flags: FuncFlags::PUBLIC,
            body: Block { stmts: vec![], span: Span::DUMMY },
            borrow_graph: None,
            move_plan: None,
        }
    }

    #[test]
    fn lift_builds_edge_for_borrow_info_touching_function_locals() {
        let param = DefId(1);
        let func = empty_func(1, param);
        let mut sema = SemaResult::new();
        sema.borrow_infos.push(BorrowInfo {
            borrower: DefId(2),
            place_base: param,
            kind: BorrowKind::Shared,
            span: Span::DUMMY,
            scope: ScopeId(0),
        });
        let (graph, _plan) = lift(&func, &sema);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].to, param);
    }

    #[test]
    fn spawn_escape_forbids_move_with_task_escape_reason() {
        let param = DefId(1);
        let func = empty_func(1, param);
        let mut sema = SemaResult::new();
        sema.borrow_events.push(BorrowEventRaw {
            id: BorrowId(0),
            kind: BorrowEventKind::SpawnEscape,
            local: param,
            peer: None,
            span: Span::DUMMY,
            scope: ScopeId(0),
            blocked_reason: None,
        });
        let (_graph, plan) = lift(&func, &sema);
        let info = plan.get(param).unwrap();
        assert_eq!(info.policy, MovePolicy::Forbidden);
        assert_eq!(info.why.as_deref(), Some("task escape"));
    }

    #[test]
    fn copy_typed_param_defaults_to_move_copy_policy() {
        let param = DefId(1);
        let func = empty_func(1, param);
        let sema = SemaResult::new();
        let (_graph, plan) = lift(&func, &sema);
        assert_eq!(plan.get(param).unwrap().policy, MovePolicy::Copy);
    }
}
