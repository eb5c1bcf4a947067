//! HIR Normalizer (spec.md §4.2): eliminates `Compare` expressions and
//! `For` statements, leaving only the reduced primitive construct set.
//! Runs once per function, immediately after lowering and before the
//! Borrow Lifter (spec.md §2's pipeline diagram puts the borrow-graph lift
//! directly after normalization).

use crate::borrow::{self, BorrowGraph, MovePlan};
use crate::hir::{
    BinOp, Block, CompareArm, Expr, ExprKind, ForKind, Func, Literal, Ownership, Pattern, Stmt,
};
use crate::ownership::classify;
use vela_sema::{ExprId, SemaResult, Type, TypeId};
use vela_util::{DefId, DefIdGenerator, Span, Symbol};

struct NormCtx<'a> {
    sema: &'a mut SemaResult,
    def_gen: &'a DefIdGenerator,
    next_expr: u32,
    fresh_counter: u32,
    /// Depth of classic `for` loops currently open, so a `continue`
    /// belonging to an *inner* `while`/`for` is left untouched (spec.md
    /// §4.2: "does not descend into nested while/for whose own continues
    /// belong to an inner loop").
    for_depth: u32,
}

impl<'a> NormCtx<'a> {
    fn new(sema: &'a mut SemaResult, def_gen: &'a DefIdGenerator, next_expr: u32) -> Self {
        Self { sema, def_gen, next_expr, fresh_counter: 0, for_depth: 0 }
    }

    fn next_expr_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr);
        self.next_expr += 1;
        id
    }

    fn fresh_symbol(&mut self, prefix: &str) -> (Symbol, DefId) {
        self.fresh_counter += 1;
        (Symbol::intern(&format!("__{}{}", prefix, self.fresh_counter)), self.def_gen.next())
    }

    fn bool_ty(&mut self) -> TypeId {
        self.sema.interner.intern(Type::Bool)
    }

    fn int_ty(&mut self) -> TypeId {
        self.sema.interner.intern(Type::Int64)
    }
}

/// Runs the normalizer over `func`'s body, then lifts the borrow graph and
/// move plan against the normalized tree, as `lower_module` requires.
pub fn normalize_and_lift(func: &mut Func, sema: &mut SemaResult, def_gen: &DefIdGenerator) -> (Block, BorrowGraph, MovePlan) {
    let mut ctx = NormCtx::new(sema, def_gen, next_expr_id_seed(func));
    let body = normalize_block(&mut ctx, &func.body);
    func.body = body.clone();
    let (graph, plan) = borrow::lift(func, ctx.sema);
    (body, graph, plan)
}

/// `ExprId`s are assigned densely by the lowerer starting at 0; the
/// normalizer keeps minting from one past the highest id it finds so newly
/// synthesized exprs (temps, intrinsic calls) never collide with an
/// existing one that `SemaResult` still has a type recorded for.
fn next_expr_id_seed(func: &Func) -> u32 {
    let mut max = 0u32;
    crate::hir::visit_exprs_in_block(&func.body, &mut |e| max = max.max(e.id.0 + 1));
    max
}

fn normalize_block(ctx: &mut NormCtx, block: &Block) -> Block {
    let mut stmts = Vec::with_capacity(block.stmts.len());
    for stmt in &block.stmts {
        normalize_stmt(ctx, stmt, &mut stmts);
    }
    Block { stmts, span: block.span }
}

fn normalize_stmt(ctx: &mut NormCtx, stmt: &Stmt, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::Let { name, symbol, ty, value, is_mut, is_const, ownership, pattern } => out.push(Stmt::Let {
            name: *name,
            symbol: *symbol,
            ty: *ty,
            value: value.as_ref().map(|v| normalize_expr(ctx, v)),
            is_mut: *is_mut,
            is_const: *is_const,
            ownership: *ownership,
            pattern: pattern.clone(),
        }),
        Stmt::Expr(e) => out.push(Stmt::Expr(normalize_expr(ctx, e))),
        Stmt::Assign { target, value } => out.push(Stmt::Assign { target: normalize_expr(ctx, target), value: normalize_expr(ctx, value) }),
        Stmt::Return { value, is_tail, span } => out.push(Stmt::Return { value: value.as_ref().map(|v| normalize_expr(ctx, v)), is_tail: *is_tail, span: *span }),
        Stmt::Break { span } => out.push(Stmt::Break { span: *span }),
        Stmt::Continue { span } => out.push(Stmt::Continue { span: *span }),
        Stmt::If { cond, then_block, else_block } => out.push(Stmt::If {
            cond: normalize_expr(ctx, cond),
            then_block: normalize_block(ctx, then_block),
            else_block: else_block.as_ref().map(|b| normalize_block(ctx, b)),
        }),
        Stmt::While { cond, body } => out.push(Stmt::While { cond: normalize_expr(ctx, cond), body: normalize_block(ctx, body) }),
        Stmt::Block(b) => out.push(Stmt::Block(normalize_block(ctx, b))),
        Stmt::Drop { value } => out.push(Stmt::Drop { value: normalize_expr(ctx, value) }),
        Stmt::For { kind, body, span } => out.push(normalize_for(ctx, kind, body, *span)),
    }
}

fn normalize_expr(ctx: &mut NormCtx, expr: &Expr) -> Expr {
    let span = expr.span;
    let ty = expr.ty;
    let id = expr.id;
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef { .. } => expr.clone(),
        ExprKind::UnaryOp { op, operand } => Expr { id, kind: ExprKind::UnaryOp { op: *op, operand: Box::new(normalize_expr(ctx, operand)) }, ty, span },
        ExprKind::BinaryOp { op, left, right } => Expr {
            id,
            kind: ExprKind::BinaryOp { op: *op, left: Box::new(normalize_expr(ctx, left)), right: Box::new(normalize_expr(ctx, right)) },
            ty,
            span,
        },
        ExprKind::Call { callee, args } => Expr {
            id,
            kind: ExprKind::Call { callee: Box::new(normalize_expr(ctx, callee)), args: args.iter().map(|a| normalize_expr(ctx, a)).collect() },
            ty,
            span,
        },
        ExprKind::FieldAccess { object, field } => Expr { id, kind: ExprKind::FieldAccess { object: Box::new(normalize_expr(ctx, object)), field: *field }, ty, span },
        ExprKind::Index { object, index } => Expr { id, kind: ExprKind::Index { object: Box::new(normalize_expr(ctx, object)), index: Box::new(normalize_expr(ctx, index)) }, ty, span },
        ExprKind::StructLit { name, fields } => Expr {
            id,
            kind: ExprKind::StructLit { name: *name, fields: fields.iter().map(|(n, v)| (*n, normalize_expr(ctx, v))).collect() },
            ty,
            span,
        },
        ExprKind::ArrayLit { elements } => Expr { id, kind: ExprKind::ArrayLit { elements: elements.iter().map(|e| normalize_expr(ctx, e)).collect() }, ty, span },
        ExprKind::TupleLit { elements } => Expr { id, kind: ExprKind::TupleLit { elements: elements.iter().map(|e| normalize_expr(ctx, e)).collect() }, ty, span },
        ExprKind::TagTest { subject, tag_name } => Expr { id, kind: ExprKind::TagTest { subject: Box::new(normalize_expr(ctx, subject)), tag_name: *tag_name }, ty, span },
        ExprKind::TagPayload { subject, tag_name, index } => {
            Expr { id, kind: ExprKind::TagPayload { subject: Box::new(normalize_expr(ctx, subject)), tag_name: *tag_name, index: *index }, ty, span }
        }
        ExprKind::IterInit { iterable } => Expr { id, kind: ExprKind::IterInit { iterable: Box::new(normalize_expr(ctx, iterable)) }, ty, span },
        ExprKind::IterNext { iterator } => Expr { id, kind: ExprKind::IterNext { iterator: Box::new(normalize_expr(ctx, iterator)) }, ty, span },
        ExprKind::If { cond, then_expr, else_expr } => Expr {
            id,
            kind: ExprKind::If {
                cond: Box::new(normalize_expr(ctx, cond)),
                then_expr: Box::new(normalize_expr(ctx, then_expr)),
                else_expr: else_expr.as_ref().map(|e| Box::new(normalize_expr(ctx, e))),
            },
            ty,
            span,
        },
        ExprKind::Await { value } => Expr { id, kind: ExprKind::Await { value: Box::new(normalize_expr(ctx, value)) }, ty, span },
        ExprKind::Spawn { body } => Expr { id, kind: ExprKind::Spawn { body: Box::new(normalize_expr(ctx, body)) }, ty, span },
        ExprKind::Async { body } => Expr { id, kind: ExprKind::Async { body: Box::new(normalize_expr(ctx, body)) }, ty, span },
        ExprKind::Cast { value, target } => Expr { id, kind: ExprKind::Cast { value: Box::new(normalize_expr(ctx, value)), target: *target }, ty, span },
        ExprKind::Block(b) => Expr { id, kind: ExprKind::Block(normalize_block(ctx, b)), ty, span },
        ExprKind::Compare { subject, arms } => normalize_compare(ctx, subject, arms, ty, span),
    }
}

fn var_ref(symbol: DefId, name: Symbol, ty: TypeId, span: Span, id: ExprId) -> Expr {
    Expr { id, kind: ExprKind::VarRef { symbol, name }, ty, span }
}

fn bool_lit(ctx: &mut NormCtx, v: bool, span: Span) -> Expr {
    let id = ctx.next_expr_id();
    let ty = ctx.bool_ty();
    Expr { id, kind: ExprKind::Literal(Literal::Bool(v)), ty, span }
}

fn int_lit(ctx: &mut NormCtx, v: i64, span: Span) -> Expr {
    let id = ctx.next_expr_id();
    let ty = ctx.int_ty();
    Expr { id, kind: ExprKind::Literal(Literal::Int(v, None)), ty, span }
}

/// `default()` call used both as the non-exhaustive-`compare` fallback
/// (spec.md §4.2/§7) and by the lowerer's own default-value rule (§4.1);
/// the normalizer mints its own copy since it doesn't have `LowerCtx`'s
/// `find_symbol` helper.
fn default_call(ctx: &mut NormCtx, ty: TypeId, span: Span) -> Expr {
    let id = ctx.next_expr_id();
    let callee_id = ctx.next_expr_id();
    let callee = Box::new(Expr { id: callee_id, kind: ExprKind::VarRef { symbol: DefId::DUMMY, name: Symbol::intern("default") }, ty: TypeId::NONE, span });
    Expr { id, kind: ExprKind::Call { callee, args: Vec::new() }, ty, span }
}

/// Desugars `compare subject { arms }` into `block { let __cmpN = subject;
/// <arm ifs>; [fallback] }` (spec.md §4.2). The union is exhaustive, and the
/// `default()` fallback dropped, either when some arm is an unconditional
/// wildcard/binding or when the arms' tags, taken together, name every tag
/// the subject's own union type declares.
fn normalize_compare(ctx: &mut NormCtx, subject: &Expr, arms: &[CompareArm], result_ty: TypeId, span: Span) -> Expr {
    let subject = normalize_expr(ctx, subject);
    let subject_ty = subject.ty;
    let (cmp_name, cmp_symbol) = ctx.fresh_symbol("cmp");
    let subject_ownership = classify(&ctx.sema.interner, subject_ty);
    let declared_tags = match ctx.sema.interner.get(subject_ty) {
        Type::Union { tags, .. } => Some(tags.iter().map(|(name, _)| *name).collect::<Vec<_>>()),
        _ => None,
    };

    let mut stmts = vec![Stmt::Let {
        name: cmp_name,
        symbol: cmp_symbol,
        ty: subject_ty,
        value: Some(subject),
        is_mut: false,
        is_const: false,
        ownership: subject_ownership,
        pattern: None,
    }];

    let mut exhaustive = false;
    let mut covered_tags: Vec<Symbol> = Vec::new();
    for arm in arms {
        let (stmt, covers) = desugar_arm(ctx, arm, cmp_symbol, cmp_name, subject_ty);
        stmts.push(stmt);
        match covers {
            ArmCoverage::Unconditional => exhaustive = true,
            ArmCoverage::Tag(name) => covered_tags.push(name),
            ArmCoverage::Partial => {}
        }
    }
    if let Some(declared) = &declared_tags {
        if !exhaustive && declared.iter().all(|t| covered_tags.contains(t)) {
            exhaustive = true;
        }
    }

    if !exhaustive {
        stmts.push(Stmt::Return { value: Some(default_call(ctx, result_ty, span)), is_tail: false, span });
    }

    let id = ctx.next_expr_id();
    Expr { id, kind: ExprKind::Block(Block { stmts, span }), ty: result_ty, span }
}

/// What an arm contributes toward proving the whole `compare` exhaustive.
enum ArmCoverage {
    /// A wildcard or bare binding with no guard: covers every remaining case.
    Unconditional,
    /// A `Tag`/zero-payload-tag arm with no guard and fully irrefutable
    /// payload: covers exactly this one tag of the subject's union.
    Tag(Symbol),
    /// Anything else (literal, guarded, partially refutable payload).
    Partial,
}

/// Desugars one arm into a guarded `if`.
fn desugar_arm(ctx: &mut NormCtx, arm: &CompareArm, cmp_symbol: DefId, cmp_name: Symbol, subject_ty: TypeId) -> (Stmt, ArmCoverage) {
    let span = arm.span;
    let unconditional_cover = arm.guard.is_none() && matches!(arm.pattern, Pattern::Wildcard | Pattern::Binding { .. });

    match &arm.pattern {
        Pattern::Wildcard => (
            guarded_return(ctx, None, &arm.guard, &arm.result, span),
            if unconditional_cover { ArmCoverage::Unconditional } else { ArmCoverage::Partial },
        ),
        Pattern::Binding { name, symbol } => {
            let subject_ref = var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id());
            let bind = Stmt::Let { name: *name, symbol: *symbol, ty: subject_ty, value: Some(subject_ref), is_mut: false, is_const: false, ownership: classify(&ctx.sema.interner, subject_ty), pattern: None };
            let ret = guarded_return(ctx, None, &arm.guard, &arm.result, span);
            (
                Stmt::Block(Block { stmts: vec![bind, ret], span }),
                if unconditional_cover { ArmCoverage::Unconditional } else { ArmCoverage::Partial },
            )
        }
        Pattern::Literal(lit) => {
            let subject_ref = var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id());
            let lit_expr = literal_expr(ctx, lit, subject_ty, span);
            let cond = bin(ctx, BinOp::Eq, subject_ref, lit_expr, span);
            (guarded_if(ctx, cond, &arm.guard, &arm.result, span), ArmCoverage::Partial)
        }
        Pattern::Tag { name, payload } => desugar_tag_arm(ctx, *name, payload, arm, cmp_symbol, cmp_name, subject_ty, span),
        Pattern::Tuple { elements } => {
            let (stmt, covers) = desugar_tuple_arm(ctx, elements, arm, cmp_symbol, cmp_name, subject_ty, span);
            (stmt, if covers { ArmCoverage::Unconditional } else { ArmCoverage::Partial })
        }
        // Not otherwise classified by the shape table (spec.md §7's
        // recovery row): fall back to a literal-equality test against the
        // subject so the arm still compiles to something well-typed.
        Pattern::Or(_) => {
            let subject_ref = var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id());
            let fallback_true = bool_lit(ctx, true, span);
            let cond = bin(ctx, BinOp::Eq, subject_ref, fallback_true, span);
            (guarded_if(ctx, cond, &arm.guard, &arm.result, span), ArmCoverage::Partial)
        }
    }
}

fn literal_expr(ctx: &mut NormCtx, lit: &Literal, ty: TypeId, span: Span) -> Expr {
    let id = ctx.next_expr_id();
    Expr { id, kind: ExprKind::Literal(lit.clone()), ty, span }
}

fn bin(ctx: &mut NormCtx, op: BinOp, left: Expr, right: Expr, span: Span) -> Expr {
    let id = ctx.next_expr_id();
    let ty = ctx.bool_ty();
    Expr { id, kind: ExprKind::BinaryOp { op, left: Box::new(left), right: Box::new(right) }, ty, span }
}

/// `if cond { [guard?] return result }`.
fn guarded_if(ctx: &mut NormCtx, cond: Expr, guard: &Option<Expr>, result: &Expr, span: Span) -> Stmt {
    let inner = Block { stmts: vec![guarded_return_stmt(ctx, guard, result, span)], span };
    Stmt::If { cond, then_block: inner, else_block: None }
}

/// Like [`guarded_if`] but for arms with no outer condition to test
/// (wildcard/binding arms): wraps straight in a block so a guard can still
/// gate the return.
fn guarded_return(ctx: &mut NormCtx, outer_cond: Option<Expr>, guard: &Option<Expr>, result: &Expr, span: Span) -> Stmt {
    let stmt = guarded_return_stmt(ctx, guard, result, span);
    match outer_cond {
        Some(cond) => Stmt::If { cond, then_block: Block { stmts: vec![stmt], span }, else_block: None },
        None => stmt,
    }
}

fn guarded_return_stmt(ctx: &mut NormCtx, guard: &Option<Expr>, result: &Expr, span: Span) -> Stmt {
    let result = normalize_expr(ctx, result);
    let ret = Stmt::Return { value: Some(result), is_tail: false, span };
    match guard {
        Some(g) => {
            let guard_expr = normalize_expr(ctx, g);
            Stmt::If { cond: guard_expr, then_block: Block { stmts: vec![ret], span }, else_block: None }
        }
        None => ret,
    }
}

fn tag_test(ctx: &mut NormCtx, cmp_symbol: DefId, cmp_name: Symbol, subject_ty: TypeId, tag: Symbol, span: Span) -> Expr {
    let subject = Box::new(var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id()));
    let id = ctx.next_expr_id();
    let ty = ctx.bool_ty();
    Expr { id, kind: ExprKind::TagTest { subject, tag_name: tag }, ty, span }
}

fn tag_payload(ctx: &mut NormCtx, cmp_symbol: DefId, cmp_name: Symbol, subject_ty: TypeId, tag: Symbol, index: usize, span: Span, ty: TypeId) -> Expr {
    let subject = Box::new(var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id()));
    let id = ctx.next_expr_id();
    Expr { id, kind: ExprKind::TagPayload { subject, tag_name: tag, index }, ty, span }
}

/// The declared type of `tag`'s `index`-th payload slot, read out of the
/// subject's own `Type::Union` (spec.md §3: intrinsic-introduced exprs
/// carry real context-derived types, not `TypeId::NONE`). Falls back to
/// `TypeId::NONE` when the subject type isn't a resolved union (still a
/// generic parameter, or recovery input per spec.md §7).
fn tag_payload_type(ctx: &NormCtx, subject_ty: TypeId, tag: Symbol, index: usize) -> TypeId {
    match ctx.sema.interner.get(subject_ty) {
        Type::Union { tags, .. } => {
            tags.iter().find(|(name, _)| *name == tag).and_then(|(_, payload)| payload.get(index)).copied().unwrap_or(TypeId::NONE)
        }
        _ => TypeId::NONE,
    }
}

/// The declared type of the `index`-th element of the subject's own
/// `Type::Tuple`, analogous to [`tag_payload_type`] for tuple-arm binds.
fn tuple_element_type(ctx: &NormCtx, subject_ty: TypeId, index: usize) -> TypeId {
    match ctx.sema.interner.get(subject_ty) {
        Type::Tuple(elems) => elems.get(index).copied().unwrap_or(TypeId::NONE),
        _ => TypeId::NONE,
    }
}

/// `Tag(p1, …, pn)` payload arm (spec.md §4.2): outer `if TagTest`, with
/// each non-wildcard payload slot bound by `let` inside, or folded into an
/// `&&`-chained literal-equality condition.
fn desugar_tag_arm(ctx: &mut NormCtx, tag: Symbol, payload: &[Pattern], arm: &CompareArm, cmp_symbol: DefId, cmp_name: Symbol, subject_ty: TypeId, span: Span) -> (Stmt, ArmCoverage) {
    let outer = tag_test(ctx, cmp_symbol, cmp_name, subject_ty, tag, span);

    // `nothing` has no payload slots; both it and a zero-payload `Tag`
    // desugar identically to a bare `if TagTest(...)`. With no guard this
    // covers the whole of `tag` unconditionally once matched.
    if payload.is_empty() {
        let coverage = if arm.guard.is_none() { ArmCoverage::Tag(tag) } else { ArmCoverage::Partial };
        return (guarded_if(ctx, outer, &arm.guard, &arm.result, span), coverage);
    }

    let mut binds = Vec::new();
    let mut extra_cond: Option<Expr> = None;
    let mut fully_irrefutable = true;
    for (i, pat) in payload.iter().enumerate() {
        match pat {
            Pattern::Wildcard => {}
            Pattern::Binding { name, symbol } => {
                let payload_ty = tag_payload_type(ctx, subject_ty, tag, i);
                let value = tag_payload(ctx, cmp_symbol, cmp_name, subject_ty, tag, i, span, payload_ty);
                binds.push(Stmt::Let { name: *name, symbol: *symbol, ty: payload_ty, value: Some(value), is_mut: false, is_const: false, ownership: classify(&ctx.sema.interner, payload_ty), pattern: None });
            }
            Pattern::Literal(lit) => {
                fully_irrefutable = false;
                let payload_ty = tag_payload_type(ctx, subject_ty, tag, i);
                let value = tag_payload(ctx, cmp_symbol, cmp_name, subject_ty, tag, i, span, payload_ty);
                let lit_expr = literal_expr(ctx, lit, payload_ty, span);
                let eq = bin(ctx, BinOp::Eq, value, lit_expr, span);
                extra_cond = Some(match extra_cond {
                    Some(c) => bin(ctx, BinOp::And, c, eq, span),
                    None => eq,
                });
            }
            other => {
                // Nested tuple/tag sub-patterns bind their own temp and
                // recurse through the same payload-extraction shape.
                fully_irrefutable = false;
                let payload_ty = tag_payload_type(ctx, subject_ty, tag, i);
                let value = tag_payload(ctx, cmp_symbol, cmp_name, subject_ty, tag, i, span, payload_ty);
                let (nested_name, nested_symbol) = ctx.fresh_symbol("pay");
                binds.push(Stmt::Let { name: nested_name, symbol: nested_symbol, ty: payload_ty, value: Some(value), is_mut: false, is_const: false, ownership: classify(&ctx.sema.interner, payload_ty), pattern: Some(other.clone()) });
            }
        }
    }

    let inner_body = match extra_cond {
        Some(cond) => {
            let mut inner_stmts = binds;
            inner_stmts.push(guarded_return(ctx, None, &arm.guard, &arm.result, span));
            vec![Stmt::If { cond, then_block: Block { stmts: inner_stmts, span }, else_block: None }]
        }
        None => {
            let mut inner_stmts = binds;
            inner_stmts.push(guarded_return(ctx, None, &arm.guard, &arm.result, span));
            inner_stmts
        }
    };

    let coverage = if fully_irrefutable && arm.guard.is_none() { ArmCoverage::Tag(tag) } else { ArmCoverage::Partial };
    (Stmt::If { cond: outer, then_block: Block { stmts: inner_body, span }, else_block: None }, coverage)
}

/// Tuple pattern arm (spec.md §4.2): each element either binds via a
/// `FieldAccess` on the subject (`__cmpN.0`, `__cmpN.1`, ...) or folds into
/// a literal-equality condition, unconditionally covering the arm.
fn desugar_tuple_arm(ctx: &mut NormCtx, elements: &[Pattern], arm: &CompareArm, cmp_symbol: DefId, cmp_name: Symbol, subject_ty: TypeId, span: Span) -> (Stmt, bool) {
    let mut binds = Vec::new();
    let mut cond: Option<Expr> = None;
    let mut fully_irrefutable = true;
    for (i, pat) in elements.iter().enumerate() {
        let field = Symbol::intern(&i.to_string());
        let elem_ty = tuple_element_type(ctx, subject_ty, i);
        let subject_ref = var_ref(cmp_symbol, cmp_name, subject_ty, span, ctx.next_expr_id());
        let field_id = ctx.next_expr_id();
        let field_access = Expr { id: field_id, kind: ExprKind::FieldAccess { object: Box::new(subject_ref), field }, ty: elem_ty, span };
        match pat {
            Pattern::Wildcard => {}
            Pattern::Binding { name, symbol } => {
                binds.push(Stmt::Let { name: *name, symbol: *symbol, ty: elem_ty, value: Some(field_access), is_mut: false, is_const: false, ownership: classify(&ctx.sema.interner, elem_ty), pattern: None });
            }
            Pattern::Literal(lit) => {
                fully_irrefutable = false;
                let lit_expr = literal_expr(ctx, lit, elem_ty, span);
                let eq = bin(ctx, BinOp::Eq, field_access, lit_expr, span);
                cond = Some(match cond {
                    Some(c) => bin(ctx, BinOp::And, c, eq, span),
                    None => eq,
                });
            }
            other => {
                fully_irrefutable = false;
                let (nested_name, nested_symbol) = ctx.fresh_symbol("tup");
                binds.push(Stmt::Let { name: nested_name, symbol: nested_symbol, ty: elem_ty, value: Some(field_access), is_mut: false, is_const: false, ownership: classify(&ctx.sema.interner, elem_ty), pattern: Some(other.clone()) });
            }
        }
    }

    let covers = fully_irrefutable && arm.guard.is_none();
    match cond {
        Some(cond) => {
            let mut stmts = binds;
            stmts.push(guarded_return(ctx, None, &arm.guard, &arm.result, span));
            (Stmt::If { cond, then_block: Block { stmts, span }, else_block: None }, false)
        }
        None => {
            let mut stmts = binds;
            stmts.push(guarded_return(ctx, None, &arm.guard, &arm.result, span));
            (Stmt::Block(Block { stmts, span }), covers)
        }
    }
}

/// Dispatches to the three `For` desugarings (spec.md §4.2).
fn normalize_for(ctx: &mut NormCtx, kind: &ForKind, body: &Block, span: Span) -> Stmt {
    match kind {
        ForKind::Classic { init, cond, post } => normalize_for_classic(ctx, init, cond, post, body, span),
        ForKind::Range { var, var_symbol, start, end, inclusive } => normalize_for_range(ctx, *var, *var_symbol, start, end, *inclusive, body, span),
        ForKind::Iterator { var, var_symbol, iterable } => normalize_for_iterator(ctx, *var, *var_symbol, iterable, body, span),
    }
}

/// Classic `for (init; cond; post)` (spec.md §4.2): `continue` inside the
/// body runs `post` first; `post` also runs inline after the body.
fn normalize_for_classic(ctx: &mut NormCtx, init: &Option<Box<Stmt>>, cond: &Option<Box<Expr>>, post: &Option<Box<Expr>>, body: &Block, span: Span) -> Stmt {
    let mut outer = Vec::new();
    if let Some(init) = init {
        normalize_stmt(ctx, init, &mut outer);
    }

    let cond_expr = match cond {
        Some(c) => normalize_expr(ctx, c),
        None => bool_lit(ctx, true, span),
    };

    let post_expr = post.as_ref().map(|p| normalize_expr(ctx, p));
    ctx.for_depth += 1;
    let mut body_stmts = rewrite_continues(ctx, body, post_expr.as_ref());
    ctx.for_depth -= 1;
    if let Some(post_expr) = &post_expr {
        body_stmts.push(Stmt::Expr(post_expr.clone()));
    }

    outer.push(Stmt::While { cond: cond_expr, body: Block { stmts: body_stmts, span } });
    Stmt::Block(Block { stmts: outer, span })
}

/// Numeric-range `for x in a..b` / `a..=b` (spec.md §4.2): `while x < __end`
/// (or `<=` when inclusive), stepping `x = x + 1` both inline and before
/// every `continue`.
fn normalize_for_range(ctx: &mut NormCtx, var: Symbol, var_symbol: DefId, start: &Expr, end: &Expr, inclusive: bool, body: &Block, span: Span) -> Stmt {
    let start = normalize_expr(ctx, start);
    let int_ty = start.ty;
    let end = normalize_expr(ctx, end);
    let (end_name, end_symbol) = ctx.fresh_symbol("end");

    let mut outer = vec![
        Stmt::Let { name: var, symbol: var_symbol, ty: int_ty, value: Some(start), is_mut: true, is_const: false, ownership: Ownership::Copy, pattern: None },
        Stmt::Let { name: end_name, symbol: end_symbol, ty: int_ty, value: Some(end), is_mut: false, is_const: false, ownership: Ownership::Copy, pattern: None },
    ];

    let var_expr = |ctx: &mut NormCtx| var_ref(var_symbol, var, int_ty, span, ctx.next_expr_id());
    let end_expr = |ctx: &mut NormCtx| var_ref(end_symbol, end_name, int_ty, span, ctx.next_expr_id());
    let step = |ctx: &mut NormCtx| -> Stmt {
        let one = int_lit(ctx, 1, span);
        let value = bin(ctx, BinOp::Add, var_expr(ctx), one, span);
        Stmt::Assign { target: var_expr(ctx), value }
    };

    let op = if inclusive { BinOp::Le } else { BinOp::Lt };
    let cond = bin(ctx, op, var_expr(ctx), end_expr(ctx), span);

    let step_expr_for_continue = {
        let one = int_lit(ctx, 1, span);
        bin(ctx, BinOp::Add, var_expr(ctx), one, span)
    };
    ctx.for_depth += 1;
    let mut body_stmts = rewrite_continues(ctx, body, Some(&step_expr_for_continue));
    ctx.for_depth -= 1;
    body_stmts.push(step(ctx));

    outer.push(Stmt::While { cond, body: Block { stmts: body_stmts, span } });
    Stmt::Block(Block { stmts: outer, span })
}

/// Generic iterator `for x in xs` (spec.md §4.2): `IterInit`/`IterNext`
/// intrinsics with `TypeId::NONE`, matched against a `nothing`/`Some` tag
/// the way a `compare` would be, but hand-desugared directly into
/// `while true { ...; if TagTest(next, "nothing") { break; } ... }`.
fn normalize_for_iterator(ctx: &mut NormCtx, var: Symbol, var_symbol: DefId, iterable: &Expr, body: &Block, span: Span) -> Stmt {
    let iterable = normalize_expr(ctx, iterable);
    let (iter_name, iter_symbol) = ctx.fresh_symbol("iter");
    let (next_name, next_symbol) = ctx.fresh_symbol("next");

    let init_id = ctx.next_expr_id();
    let init_expr = Expr { id: init_id, kind: ExprKind::IterInit { iterable: Box::new(iterable) }, ty: TypeId::NONE, span };
    let init_let = Stmt::Let { name: iter_name, symbol: iter_symbol, ty: TypeId::NONE, value: Some(init_expr), is_mut: true, is_const: false, ownership: Ownership::None, pattern: None };

    let iter_ref = var_ref(iter_symbol, iter_name, TypeId::NONE, span, ctx.next_expr_id());
    let next_id = ctx.next_expr_id();
    let next_expr = Expr { id: next_id, kind: ExprKind::IterNext { iterator: Box::new(iter_ref) }, ty: TypeId::NONE, span };
    let next_let = Stmt::Let { name: next_name, symbol: next_symbol, ty: TypeId::NONE, value: Some(next_expr), is_mut: false, is_const: false, ownership: Ownership::None, pattern: None };

    let next_ref_for_test = var_ref(next_symbol, next_name, TypeId::NONE, span, ctx.next_expr_id());
    let tag_test_id = ctx.next_expr_id();
    let bool_ty = ctx.bool_ty();
    let is_nothing = Expr {
        id: tag_test_id,
        kind: ExprKind::TagTest { subject: Box::new(next_ref_for_test), tag_name: Symbol::intern("nothing") },
        ty: bool_ty,
        span,
    };
    let break_if_done = Stmt::If { cond: is_nothing, then_block: Block { stmts: vec![Stmt::Break { span }], span }, else_block: None };

    let next_ref_for_payload = var_ref(next_symbol, next_name, TypeId::NONE, span, ctx.next_expr_id());
    let payload_id = ctx.next_expr_id();
    let payload = Expr { id: payload_id, kind: ExprKind::TagPayload { subject: Box::new(next_ref_for_payload), tag_name: Symbol::intern("Some"), index: 0 }, ty: TypeId::NONE, span };
    let bind_var = Stmt::Let { name: var, symbol: var_symbol, ty: TypeId::NONE, value: Some(payload), is_mut: false, is_const: false, ownership: Ownership::None, pattern: None };

    // Generic-iterator `for` has no post-step, so `continue` is rewritten
    // to nothing extra — it already jumps straight to the next `IterNext`.
    ctx.for_depth += 1;
    let body_stmts = rewrite_continues(ctx, body, None);
    ctx.for_depth -= 1;

    let mut loop_body = vec![next_let, break_if_done, bind_var];
    loop_body.extend(body_stmts);

    let true_lit = bool_lit(ctx, true, span);
    let while_stmt = Stmt::While { cond: true_lit, body: Block { stmts: loop_body, span } };
    Stmt::Block(Block { stmts: vec![init_let, while_stmt], span })
}

/// Rewrites every `continue` in `body` that belongs to *this* loop (not a
/// nested `while`/`for`) into `{ <post>; continue }`, per spec.md §4.2.
/// When `post` is `None` (the generic-iterator desugaring), `continue` is
/// left as-is.
fn rewrite_continues(ctx: &mut NormCtx, body: &Block, post: Option<&Expr>) -> Vec<Stmt> {
    let normalized = normalize_block(ctx, body);
    normalized.stmts.into_iter().map(|s| rewrite_continue_in_stmt(ctx, s, post)).collect()
}

fn rewrite_continue_in_stmt(ctx: &mut NormCtx, stmt: Stmt, post: Option<&Expr>) -> Stmt {
    match stmt {
        Stmt::Continue { span } => match post {
            Some(post) => Stmt::Block(Block { stmts: vec![Stmt::Expr(post.clone()), Stmt::Continue { span }], span }),
            None => Stmt::Continue { span },
        },
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: rewrite_continue_in_block(ctx, then_block, post),
            else_block: else_block.map(|b| rewrite_continue_in_block(ctx, b, post)),
        },
        Stmt::Block(b) => Stmt::Block(rewrite_continue_in_block(ctx, b, post)),
        // A nested `While`/`For`'s own `continue`s belong to it, not the
        // loop currently being desugared (spec.md §4.2) — left untouched.
        other @ (Stmt::While { .. } | Stmt::For { .. }) => other,
        other => other,
    }
}

fn rewrite_continue_in_block(ctx: &mut NormCtx, block: Block, post: Option<&Expr>) -> Block {
    Block { stmts: block.stmts.into_iter().map(|s| rewrite_continue_in_stmt(ctx, s, post)).collect(), span: block.span }
}
