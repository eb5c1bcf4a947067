//! `fn f(x: int) -> int { return clone(x); }` monomorphized: the `__clone`
//! intrinsic on a copy-typed receiver must vanish entirely, leaving the
//! return value as the argument itself (spec.md §8 Scenario E).

use vela_hir::hir::{visit_exprs_in_block, Block, Expr, ExprKind, Func, FuncFlags, FuncId, Module, Ownership, Param, Stmt};
use vela_mono::{monomorphize_module, InstantiationMap, MonoOptions};
use vela_sema::{ExprId, FnSignature, SemaResult, SymbolEntry, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefId, FileId, Handler, Span, Symbol};

#[test]
fn clone_on_copy_type_is_elided_to_its_argument() {
    let mut sema = SemaResult::new();
    let mut symbols = SymbolResult::new();

    let int_ty = sema.interner.intern(Type::Int64);

    let f_sym = symbols.define(SymbolEntry {
        name: Symbol::intern("f"),
        kind: SymbolKind::Function,
        declared_type: TypeId::NONE,
        type_params: vec![],
        signature: Some(FnSignature { param_types: vec![int_ty], param_has_default: vec![false], variadic: false, has_self: false }),
        receiver_key: None,
        decl_span: Span::DUMMY,
    });

    let x_sym = DefId(100);
    let clone_call_span = Span { start: 0, end: 0, line: 2, column: 3, file_id: FileId::DUMMY };
    let clone_call = Expr {
        id: ExprId(1),
        kind: ExprKind::Call {
            callee: Box::new(Expr {
                id: ExprId(2),
                kind: ExprKind::VarRef { symbol: DefId::DUMMY, name: Symbol::intern("__clone") },
                ty: TypeId::NONE,
                span: clone_call_span,
            }),
            args: vec![Expr { id: ExprId(3), kind: ExprKind::VarRef { symbol: x_sym, name: Symbol::intern("x") }, ty: int_ty, span: Span::DUMMY }],
        },
        ty: int_ty,
        span: clone_call_span,
    };

    let f_func = Func {
        id: FuncId(1),
        name: Symbol::intern("f"),
        symbol: f_sym,
        span: Span::DUMMY,
        generics: vec![],
        params: vec![Param { name: Symbol::intern("x"), symbol: x_sym, ty: int_ty, ownership: Ownership::Copy, default: None, has_default: false }],
        result: int_ty,
        flags: FuncFlags::PUBLIC,
        body: Block { stmts: vec![Stmt::Return { value: Some(clone_call), is_tail: true, span: Span::DUMMY }], span: Span::DUMMY },
        borrow_graph: None,
        move_plan: None,
    };

    let mut module = Module::new(Symbol::intern("m"), "m.vl", FileId(0));
    module.push_func(f_func);

    let inst_map = InstantiationMap::new();
    let handler = Handler::new();
    let result = monomorphize_module(module, &inst_map, &mut sema, &symbols, MonoOptions::default(), &handler)
        .expect("monomorphizing a non-generic clone-on-copy-type function must succeed");

    assert_eq!(result.func_count(), 1);
    let f_instance = result.funcs_sorted().remove(0);

    let mut saw_clone_call = false;
    let mut saw_bare_var = false;
    visit_exprs_in_block(&f_instance.func.body, &mut |e| {
        if let ExprKind::Call { callee, .. } = &e.kind {
            if let ExprKind::VarRef { name, .. } = &callee.kind {
                if name.as_str() == "__clone" {
                    saw_clone_call = true;
                }
            }
        }
        if let ExprKind::VarRef { name, .. } = &e.kind {
            if name.as_str() == "x" {
                saw_bare_var = true;
            }
        }
    });

    assert!(!saw_clone_call, "the __clone intrinsic must be gone after monomorphization");
    assert!(saw_bare_var, "the return value must be the bare argument once clone is elided");
}
