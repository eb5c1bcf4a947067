//! End-to-end monomorphization over a hand-built HIR module: two generic
//! functions chained (`wrap` calling `id`), each called from `main` with
//! two distinct concrete types. No parser exists in this workspace, so
//! the module is assembled directly the way `monomorphize.rs`'s own unit
//! tests assemble `Func`/`Module` values.

use vela_hir::hir::{Block, Expr, ExprKind, Func, FuncFlags, FuncId, GenericParam, Literal, Module, Ownership, Param, Stmt};
use vela_mono::{monomorphize_module, InstantiationMap, InstantiationRecorder, MonoOptions};
use vela_sema::{ExprId, FnSignature, SemaResult, SymbolEntry, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefId, FileId, Handler, Span, Symbol};

fn span_at(line: u32) -> Span {
    Span { start: 0, end: 0, line, column: 1, file_id: FileId::DUMMY }
}

#[test]
fn identity_through_two_generic_calls_yields_five_instances() {
    let mut sema = SemaResult::new();
    let mut symbols = SymbolResult::new();

    let int_ty = sema.interner.intern(Type::Int64);
    let string_ty = sema.interner.intern(Type::String);

    let id_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("id"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![Symbol::intern("T")],
        signature: Some(FnSignature { param_types: vec![TypeId::NONE], param_has_default: vec![false], variadic: false, has_self: false }),
        receiver_key: None,
        decl_span: Span::DUMMY,
    });
    let t_id = sema.interner.intern(Type::GenericParam { owner: id_sym, index: 0, name: Symbol::intern("T") });

    let wrap_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("wrap"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![Symbol::intern("T")],
        signature: Some(FnSignature { param_types: vec![TypeId::NONE], param_has_default: vec![false], variadic: false, has_self: false }),
        receiver_key: None,
        decl_span: Span::DUMMY,
    });
    let t_wrap = sema.interner.intern(Type::GenericParam { owner: wrap_sym, index: 0, name: Symbol::intern("T") });

    let main_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("main"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![], param_has_default: vec![], variadic: false, has_self: false }),
        receiver_key: None,
        decl_span: Span::DUMMY,
    });

    let mut local_gen = DefId(100).0;
    let mut next_local = || {
        local_gen += 1;
        DefId(local_gen)
    };
    let mut expr_gen = 0u32;
    let mut next_expr = || {
        expr_gen += 1;
        ExprId(expr_gen)
    };

    let x_in_id = next_local();
    let id_func = Func {
        id: FuncId(1),
        name: Symbol::intern("id"),
        symbol: id_sym,
        span: Span::DUMMY,
        generics: vec![GenericParam { name: Symbol::intern("T"), bounds: vec![] }],
        params: vec![Param { name: Symbol::intern("x"), symbol: x_in_id, ty: t_id, ownership: Ownership::None, default: None, has_default: false }],
        result: t_id,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: x_in_id, name: Symbol::intern("x") }, ty: t_id, span: Span::DUMMY }),
                is_tail: true,
                span: Span::DUMMY,
            }],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let x_in_wrap = next_local();
    let id_call_span = span_at(10);
    let wrap_func = Func {
        id: FuncId(2),
        name: Symbol::intern("wrap"),
        symbol: wrap_sym,
        span: Span::DUMMY,
        generics: vec![GenericParam { name: Symbol::intern("T"), bounds: vec![] }],
        params: vec![Param { name: Symbol::intern("x"), symbol: x_in_wrap, ty: t_wrap, ownership: Ownership::None, default: None, has_default: false }],
        result: t_wrap,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr {
                    id: next_expr(),
                    kind: ExprKind::Call {
                        callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: id_sym, name: Symbol::intern("id") }, ty: TypeId::NONE, span: id_call_span }),
                        args: vec![Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: x_in_wrap, name: Symbol::intern("x") }, ty: t_wrap, span: Span::DUMMY }],
                    },
                    ty: t_wrap,
                    span: id_call_span,
                }),
                is_tail: true,
                span: Span::DUMMY,
            }],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let a_local = next_local();
    let b_local = next_local();
    let wrap_call_int_span = span_at(20);
    let wrap_call_string_span = span_at(21);
    let main_func = Func {
        id: FuncId(3),
        name: Symbol::intern("main"),
        symbol: main_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![],
        result: TypeId::NONE,
        flags: FuncFlags::ENTRYPOINT | FuncFlags::PUBLIC,
        body: Block {
            stmts: vec![
                Stmt::Let {
                    name: Symbol::intern("a"),
                    symbol: a_local,
                    ty: int_ty,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: wrap_sym, name: Symbol::intern("wrap") }, ty: TypeId::NONE, span: wrap_call_int_span }),
                            args: vec![Expr { id: next_expr(), kind: ExprKind::Literal(Literal::Int(1, None)), ty: int_ty, span: Span::DUMMY }],
                        },
                        ty: int_ty,
                        span: wrap_call_int_span,
                    }),
                    is_mut: false,
                    is_const: false,
                    ownership: vela_hir::ownership::classify(&sema.interner, int_ty),
                    pattern: None,
                },
                Stmt::Let {
                    name: Symbol::intern("b"),
                    symbol: b_local,
                    ty: string_ty,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: wrap_sym, name: Symbol::intern("wrap") }, ty: TypeId::NONE, span: wrap_call_string_span }),
                            args: vec![Expr { id: next_expr(), kind: ExprKind::Literal(Literal::String(Symbol::intern("x"))), ty: string_ty, span: Span::DUMMY }],
                        },
                        ty: string_ty,
                        span: wrap_call_string_span,
                    }),
                    is_mut: false,
                    is_const: false,
                    ownership: vela_hir::ownership::classify(&sema.interner, string_ty),
                    pattern: None,
                },
                Stmt::Return { value: None, is_tail: true, span: Span::DUMMY },
            ],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let mut module = Module::new(Symbol::intern("m"), "m.vl", FileId(0));
    module.push_func(id_func);
    module.push_func(wrap_func);
    module.push_func(main_func);

    let mut inst_map = InstantiationMap::new();
    inst_map.record_fn(wrap_sym, vec![int_ty], wrap_call_int_span, Some(main_sym), None);
    inst_map.record_fn(wrap_sym, vec![string_ty], wrap_call_string_span, Some(main_sym), None);
    inst_map.record_fn(id_sym, vec![t_wrap], id_call_span, Some(wrap_sym), None);

    let handler = Handler::new();
    let result = monomorphize_module(module, &inst_map, &mut sema, &symbols, MonoOptions::default(), &handler)
        .expect("monomorphization of a well-formed generic module must succeed");

    assert_eq!(result.func_count(), 5);
    let names: std::collections::BTreeSet<String> = result.funcs_sorted().iter().map(|f| f.func.name.as_str().to_string()).collect();
    let expected: std::collections::BTreeSet<String> =
        ["main", "wrap::<int>", "wrap::<string>", "id::<int>", "id::<string>"].iter().map(|s| s.to_string()).collect();
    assert_eq!(names, expected);
}
