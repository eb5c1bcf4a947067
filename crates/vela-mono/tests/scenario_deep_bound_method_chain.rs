//! End-to-end monomorphization scenario F (spec.md §8): a *chain* of two
//! bound-method calls on the same generic receiver — `xs.map(f).sum()` —
//! where the intermediate receiver (`xs.map(f)`'s own result) only becomes
//! concrete once `use_vec::<T>` itself is instantiated. Both `map` and
//! `sum` must resolve to the overload matching the concrete instantiation,
//! and the fix to `resolve_call`'s callee determination (spec.md §4.5 step
//! 2) must hold across both call sites in the same body, not just one.

use vela_hir::hir::{Block, Expr, ExprKind, Func, FuncFlags, FuncId, GenericParam, Literal, Module, Ownership, Param, Stmt, TypeDecl, UnOp};
use vela_mono::{monomorphize_module, InstantiationMap, MonoOptions};
use vela_sema::{ExprId, FnSignature, SemaResult, SymbolEntry, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefId, FileId, Handler, Span, Symbol};

#[test]
fn deep_bound_method_chain_resolves_both_links_per_instantiation() {
    let mut sema = SemaResult::new();
    let mut symbols = SymbolResult::new();

    let int_ty = sema.interner.intern(Type::Int64);

    let vec_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("Vec"),
        kind: SymbolKind::Type,
        declared_type: TypeId::NONE,
        type_params: vec![Symbol::intern("T")],
        signature: None,
        receiver_key: None,
        decl_span: Span::DUMMY,
    });
    let vec_int_ty = sema.interner.intern(Type::Struct { name: Symbol::intern("Vec"), def: vec_sym, args: vec![int_ty], fields: vec![] });

    // `map` over `Vec<int>` returns another `Vec<int>` (mapping int -> int
    // here keeps the fixture small); `sum` over `Vec<int>` returns `int`.
    // Both are concrete, non-generic overloads, seeded directly in phase 2
    // — the same rationale as scenario D's `len` overloads.
    let map_int_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("map"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![vec_int_ty], param_has_default: vec![false], variadic: false, has_self: true }),
        receiver_key: Some(vec_int_ty),
        decl_span: Span::DUMMY,
    });
    let sum_int_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("sum"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![vec_int_ty], param_has_default: vec![false], variadic: false, has_self: true }),
        receiver_key: Some(vec_int_ty),
        decl_span: Span::DUMMY,
    });

    let use_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("sum_of_mapped"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![Symbol::intern("T")],
        signature: Some(FnSignature { param_types: vec![TypeId::NONE], param_has_default: vec![false], variadic: false, has_self: false }),
        receiver_key: None,
        decl_span: Span::DUMMY,
    });
    let t_use = sema.interner.intern(Type::GenericParam { owner: use_sym, index: 0, name: Symbol::intern("T") });
    let vec_t_use = sema.interner.intern(Type::Struct { name: Symbol::intern("Vec"), def: vec_sym, args: vec![t_use], fields: vec![] });
    let ref_vec_t_use = sema.interner.intern(Type::Reference { inner: vec_t_use, mutable: false });

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

    // `fn sum_of_mapped<T>(v: &Vec<T>) -> int { let mapped = v.map(); return mapped.sum(); }`
    // Neither `map` nor `sum` can be resolved at lowering time — `v`'s
    // declared type still names `sum_of_mapped`'s own generic parameter —
    // so both callees survive as plain `FieldAccess`es. Kept as two
    // statements rather than nesting one call as the other's receiver:
    // bound-method conversion overwrites the whole `FieldAccess` node
    // (receiver included) in place, so a nested receiver call would be
    // discarded by the outer rewrite before either could be inspected.
    let v_local = next_local();
    let mapped_local = next_local();
    let map_span = span_at(10);
    let sum_span = span_at(11);
    let sum_of_mapped_func = Func {
        id: FuncId(1),
        name: Symbol::intern("sum_of_mapped"),
        symbol: use_sym,
        span: Span::DUMMY,
        generics: vec![GenericParam { name: Symbol::intern("T"), bounds: vec![] }],
        params: vec![Param { name: Symbol::intern("v"), symbol: v_local, ty: ref_vec_t_use, ownership: Ownership::Ref, default: None, has_default: false }],
        result: int_ty,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![
                Stmt::Let {
                    name: Symbol::intern("mapped"),
                    symbol: mapped_local,
                    ty: vec_t_use,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr {
                                id: next_expr(),
                                kind: ExprKind::FieldAccess {
                                    object: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: v_local, name: Symbol::intern("v") }, ty: vec_t_use, span: map_span }),
                                    field: Symbol::intern("map"),
                                },
                                ty: TypeId::NONE,
                                span: map_span,
                            }),
                            args: vec![],
                        },
                        ty: vec_t_use,
                        span: map_span,
                    }),
                    is_mut: false,
                    is_const: false,
                    ownership: Ownership::None,
                    pattern: None,
                },
                Stmt::Return {
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr {
                                id: next_expr(),
                                kind: ExprKind::FieldAccess {
                                    object: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: mapped_local, name: Symbol::intern("mapped") }, ty: vec_t_use, span: sum_span }),
                                    field: Symbol::intern("sum"),
                                },
                                ty: TypeId::NONE,
                                span: sum_span,
                            }),
                            args: vec![],
                        },
                        ty: int_ty,
                        span: sum_span,
                    }),
                    is_tail: true,
                    span: Span::DUMMY,
                },
            ],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let xs_local = next_local();
    let a_local = next_local();
    let call_span = span_at(20);
    let ref_vec_int_ty = sema.interner.intern(Type::Reference { inner: vec_int_ty, mutable: false });
    let main_func = Func {
        id: FuncId(2),
        name: Symbol::intern("main"),
        symbol: main_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![],
        result: TypeId::NONE,
        flags: FuncFlags::ENTRYPOINT | FuncFlags::PUBLIC,
        body: Block {
            stmts: vec![
                Stmt::Let { name: Symbol::intern("xs"), symbol: xs_local, ty: vec_int_ty, value: None, is_mut: false, is_const: false, ownership: Ownership::None, pattern: None },
                Stmt::Let {
                    name: Symbol::intern("a"),
                    symbol: a_local,
                    ty: int_ty,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: use_sym, name: Symbol::intern("sum_of_mapped") }, ty: TypeId::NONE, span: call_span }),
                            args: vec![Expr {
                                id: next_expr(),
                                kind: ExprKind::UnaryOp {
                                    op: UnOp::Ref { mutable: false },
                                    operand: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: xs_local, name: Symbol::intern("xs") }, ty: vec_int_ty, span: Span::DUMMY }),
                                },
                                ty: ref_vec_int_ty,
                                span: Span::DUMMY,
                            }],
                        },
                        ty: int_ty,
                        span: call_span,
                    }),
                    is_mut: false,
                    is_const: false,
                    ownership: Ownership::Copy,
                    pattern: None,
                },
                Stmt::Return { value: None, is_tail: true, span: Span::DUMMY },
            ],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let self_map_local = next_local();
    let map_int_func = Func {
        id: FuncId(3),
        name: Symbol::intern("map"),
        symbol: map_int_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![Param { name: Symbol::intern("self"), symbol: self_map_local, ty: vec_int_ty, ownership: Ownership::Ref, default: None, has_default: false }],
        result: vec_int_ty,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: self_map_local, name: Symbol::intern("self") }, ty: vec_int_ty, span: Span::DUMMY }),
                is_tail: true,
                span: Span::DUMMY,
            }],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };
    let self_sum_local = next_local();
    let sum_int_func = Func {
        id: FuncId(4),
        name: Symbol::intern("sum"),
        symbol: sum_int_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![Param { name: Symbol::intern("self"), symbol: self_sum_local, ty: vec_int_ty, ownership: Ownership::Ref, default: None, has_default: false }],
        result: int_ty,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr { id: next_expr(), kind: ExprKind::Literal(Literal::Int(0, None)), ty: int_ty, span: Span::DUMMY }),
                is_tail: true,
                span: Span::DUMMY,
            }],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let mut module = Module::new(Symbol::intern("m"), "m.vl", FileId(0));
    module.types.push(TypeDecl { name: Symbol::intern("Vec"), symbol: vec_sym, generics: vec![GenericParam { name: Symbol::intern("T"), bounds: vec![] }] });
    module.push_func(map_int_func);
    module.push_func(sum_int_func);
    module.push_func(sum_of_mapped_func);
    module.push_func(main_func);

    let mut inst_map = InstantiationMap::new();
    inst_map.record_fn(use_sym, vec![int_ty], call_span, Some(main_sym), None);

    let handler = Handler::new();
    let result = monomorphize_module(module, &inst_map, &mut sema, &symbols, MonoOptions::default(), &handler)
        .expect("monomorphization of a chained bound-method call must succeed");

    // `sum_of_mapped::<int>`, `main`, `map` (Vec<int>), `sum` (Vec<int>).
    assert_eq!(result.func_count(), 4);

    let instance = result
        .get_func_by_key(use_sym, &vela_mono::args_key_from_types(&[int_ty]))
        .expect("sum_of_mapped::<int> instance must exist");
    let map_instance = result.get_func_by_key(map_int_sym, "").expect("map(Vec<int>) must be instanced");
    let sum_instance = result.get_func_by_key(sum_int_sym, "").expect("sum(Vec<int>) must be instanced");

    let [Stmt::Let { value: Some(map_call), .. }, Stmt::Return { value: Some(sum_call), .. }] = &instance.func.body.stmts[..] else {
        panic!("expected a `let mapped = ...` followed by a trailing `return ...`");
    };

    let ExprKind::Call { callee: map_callee, .. } = &map_call.kind else { panic!("expected the `let` value to be a Call") };
    let ExprKind::VarRef { symbol: map_symbol, .. } = &map_callee.kind else { panic!("expected the map callee to be a resolved VarRef") };
    assert_eq!(*map_symbol, map_instance.instance_symbol(), "first link must resolve to the map(Vec<int>) instance");
    assert_ne!(*map_symbol, map_int_sym, "first link must carry the mono instance symbol, not the un-instantiated original");

    let ExprKind::Call { callee: sum_callee, .. } = &sum_call.kind else { panic!("expected the return value to be a Call") };
    let ExprKind::VarRef { symbol: sum_symbol, .. } = &sum_callee.kind else { panic!("expected the sum callee to be a resolved VarRef") };
    assert_eq!(*sum_symbol, sum_instance.instance_symbol(), "second link must resolve to the sum(Vec<int>) instance");
    assert_ne!(*sum_symbol, sum_int_sym, "second link must carry the mono instance symbol, not the un-instantiated original");
}
