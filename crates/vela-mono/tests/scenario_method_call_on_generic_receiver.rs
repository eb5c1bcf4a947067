//! End-to-end monomorphization scenario D (spec.md §8): a method call on a
//! receiver whose element type is still generic at lowering time survives
//! as a plain `FieldAccess` callee (the lowerer's never-fail contract —
//! §4.1 — leaves it unresolved rather than guessing), and gets flattened
//! into a direct call by the monomorphizer's bound-method conversion
//! (§4.5 step 1) once the receiver type is concrete. `use_vec::<T>` is
//! instantiated twice (`int`, `string`); each instantiation's body must
//! carry the instance symbol of the `len` overload matching its own
//! concrete receiver, not the generic `use_vec` symbol or a raw `len`.

use vela_hir::hir::{Block, Expr, ExprKind, Func, FuncFlags, FuncId, GenericParam, Literal, Module, Ownership, Param, Stmt, TypeDecl, UnOp};
use vela_mono::{monomorphize_module, InstantiationMap, MonoOptions};
use vela_sema::{ExprId, FnSignature, SemaResult, SymbolEntry, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefId, FileId, Handler, Span, Symbol};

#[test]
fn method_call_on_generic_receiver_instantiated_twice() {
    let mut sema = SemaResult::new();
    let mut symbols = SymbolResult::new();

    let int_ty = sema.interner.intern(Type::Int64);
    let string_ty = sema.interner.intern(Type::String);

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
    let vec_string_ty = sema.interner.intern(Type::Struct { name: Symbol::intern("Vec"), def: vec_sym, args: vec![string_ty], fields: vec![] });

    // Two concrete overloads of `len`, one per receiver instantiation — the
    // name resolver's own method table is necessarily monomorphic (it
    // indexes by exact receiver `TypeId`), so a generic `Vec<T>::len` is
    // modeled here the way the resolver would hand it to this workspace:
    // one symbol per concrete receiver it has already seen used.
    let len_int_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("len"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![vec_int_ty], param_has_default: vec![false], variadic: false, has_self: true }),
        receiver_key: Some(vec_int_ty),
        decl_span: Span::DUMMY,
    });
    let len_string_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("len"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![vec_string_ty], param_has_default: vec![false], variadic: false, has_self: true }),
        receiver_key: Some(vec_string_ty),
        decl_span: Span::DUMMY,
    });

    let use_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("use_vec"),
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

    // `fn use_vec<T>(v: &Vec<T>) -> int { return v.len(); }`
    // The lowerer never flattens this call — `v`'s declared type still
    // names `use_vec`'s own generic parameter, so no concrete receiver
    // type exists yet to resolve `len` against — leaving a plain
    // `FieldAccess` callee for the monomorphizer to pick up later.
    let v_local = next_local();
    let field_access_span = span_at(10);
    let use_vec_func = Func {
        id: FuncId(1),
        name: Symbol::intern("use_vec"),
        symbol: use_sym,
        span: Span::DUMMY,
        generics: vec![GenericParam { name: Symbol::intern("T"), bounds: vec![] }],
        params: vec![Param { name: Symbol::intern("v"), symbol: v_local, ty: ref_vec_t_use, ownership: Ownership::Ref, default: None, has_default: false }],
        result: int_ty,
        flags: FuncFlags::empty(),
        body: Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr {
                    id: next_expr(),
                    kind: ExprKind::Call {
                        callee: Box::new(Expr {
                            id: next_expr(),
                            kind: ExprKind::FieldAccess {
                                object: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: v_local, name: Symbol::intern("v") }, ty: vec_t_use, span: field_access_span }),
                                field: Symbol::intern("len"),
                            },
                            ty: TypeId::NONE,
                            span: field_access_span,
                        }),
                        args: vec![],
                    },
                    ty: int_ty,
                    span: field_access_span,
                }),
                is_tail: true,
                span: Span::DUMMY,
            }],
            span: Span::DUMMY,
        },
        borrow_graph: None,
        move_plan: None,
    };

    let xs_local = next_local();
    let ys_local = next_local();
    let a_local = next_local();
    let b_local = next_local();
    let call_int_span = span_at(20);
    let call_string_span = span_at(21);
    let ref_vec_int_ty = sema.interner.intern(Type::Reference { inner: vec_int_ty, mutable: false });
    let ref_vec_string_ty = sema.interner.intern(Type::Reference { inner: vec_string_ty, mutable: false });
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
                Stmt::Let { name: Symbol::intern("ys"), symbol: ys_local, ty: vec_string_ty, value: None, is_mut: false, is_const: false, ownership: Ownership::None, pattern: None },
                Stmt::Let {
                    name: Symbol::intern("a"),
                    symbol: a_local,
                    ty: int_ty,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: use_sym, name: Symbol::intern("use_vec") }, ty: TypeId::NONE, span: call_int_span }),
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
                        span: call_int_span,
                    }),
                    is_mut: false,
                    is_const: false,
                    ownership: Ownership::Copy,
                    pattern: None,
                },
                Stmt::Let {
                    name: Symbol::intern("b"),
                    symbol: b_local,
                    ty: int_ty,
                    value: Some(Expr {
                        id: next_expr(),
                        kind: ExprKind::Call {
                            callee: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: use_sym, name: Symbol::intern("use_vec") }, ty: TypeId::NONE, span: call_string_span }),
                            args: vec![Expr {
                                id: next_expr(),
                                kind: ExprKind::UnaryOp {
                                    op: UnOp::Ref { mutable: false },
                                    operand: Box::new(Expr { id: next_expr(), kind: ExprKind::VarRef { symbol: ys_local, name: Symbol::intern("ys") }, ty: vec_string_ty, span: Span::DUMMY }),
                                },
                                ty: ref_vec_string_ty,
                                span: Span::DUMMY,
                            }],
                        },
                        ty: int_ty,
                        span: call_string_span,
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

    // The two concrete `len` overloads themselves, each a trivial body
    // returning a literal — what matters here is which instance symbol
    // a call site ends up pointing at, not what `len` computes.
    let self_int_local = next_local();
    let len_int_func = Func {
        id: FuncId(3),
        name: Symbol::intern("len"),
        symbol: len_int_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![Param { name: Symbol::intern("self"), symbol: self_int_local, ty: vec_int_ty, ownership: Ownership::Ref, default: None, has_default: false }],
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
    let self_string_local = next_local();
    let len_string_func = Func {
        id: FuncId(4),
        name: Symbol::intern("len"),
        symbol: len_string_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![Param { name: Symbol::intern("self"), symbol: self_string_local, ty: vec_string_ty, ownership: Ownership::Ref, default: None, has_default: false }],
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
    module.push_func(len_int_func);
    module.push_func(len_string_func);
    module.push_func(use_vec_func);
    module.push_func(main_func);

    // No recorded `len` instantiation is needed — both overloads are
    // concrete already, so phase 2 seeds them directly; only `use_vec`'s
    // own instantiation is the type checker's job to record.
    let mut inst_map = InstantiationMap::new();
    inst_map.record_fn(use_sym, vec![int_ty], call_int_span, Some(main_sym), None);
    inst_map.record_fn(use_sym, vec![string_ty], call_string_span, Some(main_sym), None);

    let handler = Handler::new();
    let result = monomorphize_module(module, &inst_map, &mut sema, &symbols, MonoOptions::default(), &handler)
        .expect("monomorphization of a generic method-call receiver must succeed");

    // `use_vec::<int>`, `use_vec::<string>`, `main`, `len` (Vec<int>),
    // `len` (Vec<string>).
    assert_eq!(result.func_count(), 5);

    let use_vec_int = result.get_func_by_key(use_sym, &vela_mono::args_key_from_types(&[int_ty])).expect("use_vec::<int> instance must exist");
    let use_vec_string = result.get_func_by_key(use_sym, &vela_mono::args_key_from_types(&[string_ty])).expect("use_vec::<string> instance must exist");

    let len_int_instance = result.get_func_by_key(len_int_sym, "").expect("len(Vec<int>) must be instanced");
    let len_string_instance = result.get_func_by_key(len_string_sym, "").expect("len(Vec<string>) must be instanced");

    assert_eq!(called_symbol(&use_vec_int.func), len_int_instance.instance_symbol());
    assert_eq!(called_symbol(&use_vec_string.func), len_string_instance.instance_symbol());
    assert_ne!(called_symbol(&use_vec_int.func), use_sym, "call site must carry the resolved instance symbol, not the original");
    assert_ne!(called_symbol(&use_vec_int.func), len_int_sym, "call site must carry the mono instance symbol, not the un-instantiated original");
}

fn called_symbol(func: &Func) -> vela_sema::SymbolId {
    let Stmt::Return { value: Some(expr), .. } = func.body.stmts.last().expect("non-empty body") else {
        panic!("expected a trailing Return with a value");
    };
    let ExprKind::Call { callee, .. } = &expr.kind else { panic!("expected the return value to be a Call") };
    let ExprKind::VarRef { symbol, .. } = &callee.kind else { panic!("expected the callee to be a resolved VarRef") };
    *symbol
}

fn span_at(line: u32) -> Span {
    Span { start: 0, end: 0, line, column: 1, file_id: FileId::DUMMY }
}
