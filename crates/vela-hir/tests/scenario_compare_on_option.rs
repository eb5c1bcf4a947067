//! Normalizer output for `compare o { Some(x) => x, nothing => 0 }` over a
//! two-tag `Option<int>` union: no `Compare` node should survive, and since
//! the two tag arms between them name every tag the union declares, no
//! trailing `default()` fallback should be emitted either.

use vela_hir::hir::{
    visit_exprs_in_block, Block, CompareArm, Expr, ExprKind, Func, FuncFlags, FuncId,
    Literal, Pattern, Stmt,
};
use vela_sema::{ExprId, SemaResult, Type, TypeId};
use vela_util::{DefId, DefIdGenerator, Span, Symbol};

fn dummy_func(body: Block, result: TypeId) -> Func {
    Func {
        id: FuncId(1),
        name: Symbol::intern("f"),
        symbol: DefId(0),
        span: Span::DUMMY,
        generics: vec![],
        params: vec![],
        result,
        flags: FuncFlags::empty(),
        body,
        borrow_graph: None,
        move_plan: None,
    }
}

fn contains_compare(block: &Block) -> bool {
    let mut found = false;
    visit_exprs_in_block(block, &mut |e| {
        if matches!(e.kind, ExprKind::Compare { .. }) {
            found = true;
        }
    });
    found
}

fn calls_default(block: &Block) -> bool {
    let mut found = false;
    visit_exprs_in_block(block, &mut |e| {
        if let ExprKind::Call { callee, .. } = &e.kind {
            if let ExprKind::VarRef { name, .. } = &callee.kind {
                if name.as_str() == "default" {
                    found = true;
                }
            }
        }
    });
    found
}

/// Finds the `let x = ...` binding produced by `Some(x)`'s payload
/// extraction, searching into nested blocks/ifs the way the other helpers
/// here do.
fn find_let_ty(stmts: &[Stmt], name: &str) -> Option<TypeId> {
    for stmt in stmts {
        match stmt {
            Stmt::Let { name: bound_name, ty, .. } if bound_name.as_str() == name => return Some(*ty),
            Stmt::Block(b) => {
                if let Some(ty) = find_let_ty(&b.stmts, name) {
                    return Some(ty);
                }
            }
            Stmt::If { then_block, else_block, .. } => {
                if let Some(ty) = find_let_ty(&then_block.stmts, name) {
                    return Some(ty);
                }
                if let Some(b) = else_block {
                    if let Some(ty) = find_let_ty(&b.stmts, name) {
                        return Some(ty);
                    }
                }
            }
            Stmt::While { body, .. } => {
                if let Some(ty) = find_let_ty(&body.stmts, name) {
                    return Some(ty);
                }
            }
            _ => {}
        }
    }
    None
}

#[test]
fn compare_on_exhaustive_option_desugars_with_no_default_fallback() {
    let mut sema = SemaResult::new();
    let int_ty = sema.interner.intern(Type::Int64);
    let option_ty = sema.interner.intern(Type::Union {
        name: Symbol::intern("Option"),
        def: DefId(1),
        args: vec![int_ty],
        tags: vec![(Symbol::intern("Some"), vec![int_ty]), (Symbol::intern("nothing"), vec![])],
    });

    let subject = Expr { id: ExprId(0), kind: ExprKind::VarRef { symbol: DefId(2), name: Symbol::intern("o") }, ty: option_ty, span: Span::DUMMY };
    let some_arm = CompareArm {
        pattern: Pattern::Tag { name: Symbol::intern("Some"), payload: vec![Pattern::Binding { name: Symbol::intern("x"), symbol: DefId(3) }] },
        guard: None,
        result: Box::new(Expr { id: ExprId(1), kind: ExprKind::VarRef { symbol: DefId(3), name: Symbol::intern("x") }, ty: int_ty, span: Span::DUMMY }),
        span: Span::DUMMY,
    };
    let nothing_arm = CompareArm {
        pattern: Pattern::Tag { name: Symbol::intern("nothing"), payload: vec![] },
        guard: None,
        result: Box::new(Expr { id: ExprId(2), kind: ExprKind::Literal(Literal::Int(0, None)), ty: int_ty, span: Span::DUMMY }),
        span: Span::DUMMY,
    };
    let compare = Expr { id: ExprId(3), kind: ExprKind::Compare { subject: Box::new(subject), arms: vec![some_arm, nothing_arm] }, ty: int_ty, span: Span::DUMMY };
    let body = Block { stmts: vec![Stmt::Return { value: Some(compare), is_tail: true, span: Span::DUMMY }], span: Span::DUMMY };
    let mut func = dummy_func(body, int_ty);
    let def_gen = DefIdGenerator::new();
    let (normalized, _graph, _plan) = vela_hir::normalize::normalize_and_lift(&mut func, &mut sema, &def_gen);

    assert!(!contains_compare(&normalized), "no Compare node should survive normalization");
    assert!(!calls_default(&normalized), "two tags covering the whole Option union need no default() fallback");

    let mut saw_tag_test = false;
    let mut saw_tag_payload = false;
    visit_exprs_in_block(&normalized, &mut |e| match e.kind {
        ExprKind::TagTest { .. } => saw_tag_test = true,
        ExprKind::TagPayload { .. } => saw_tag_payload = true,
        _ => {}
    });
    assert!(saw_tag_test, "each tag arm must desugar to a TagTest");
    assert!(saw_tag_payload, "Some(x)'s binding must desugar to a TagPayload read");

    let x_ty = find_let_ty(&normalized.stmts, "x").expect("Some(x)'s binding must survive as a let");
    assert_eq!(x_ty, int_ty, "the payload binding must carry the tag's real payload type, not TypeId::NONE");
}
