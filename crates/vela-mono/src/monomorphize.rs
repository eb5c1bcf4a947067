//! The Monomorphizer (spec.md §4.5): five ordered phases turning a
//! possibly-generic [`hir::Module`] into a fully concrete [`MonoModule`].

use rustc_hash::FxHashMap;
use std::collections::HashSet;
use tracing::{debug, info_span, warn};

use vela_hir::hir::{self, Block, Expr, ExprKind, Stmt, UnOp};
use vela_sema::{format_type, SemaResult, SymbolId, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefId, Handler, InstanceFuncIdGenerator, InstanceSymbolIdGenerator, Span, Symbol};

use crate::error::{MonoError, MonoResult};
use crate::instantiation::{args_key_from_types, InstKind, InstantiationMap};
use crate::module::{MonoFunc, MonoModule, MonoType};
use crate::options::MonoOptions;
use crate::subst::{substitute, Substitution};

type TypeCache = FxHashMap<TypeId, TypeId>;

/// Everything one [`monomorphize_module`] call threads through every
/// phase and through `ensure_func`'s recursion.
struct MonoCtx<'a> {
    source: &'a hir::Module,
    sema: &'a mut SemaResult,
    symbols: &'a SymbolResult,
    options: MonoOptions,
    handler: &'a Handler,
    out: MonoModule,
    by_orig_sym: FxHashMap<SymbolId, hir::FuncId>,
    use_sites: FxHashMap<(InstKind, Option<SymbolId>, SymbolId, Span), Vec<TypeId>>,
    call_sites: FxHashMap<(InstKind, Option<SymbolId>, Span), (SymbolId, Vec<TypeId>)>,
    func_id_gen: InstanceFuncIdGenerator,
    sym_id_gen: InstanceSymbolIdGenerator,
    type_cache: TypeCache,
}

/// Runs the full pipeline: indexing, the three seeding phases, derived
/// types, optional dead-instance elimination, and the post-mono
/// Validator (spec.md §4.5).
pub fn monomorphize_module(
    source: hir::Module,
    inst_map: &InstantiationMap,
    sema: &mut SemaResult,
    symbols: &SymbolResult,
    options: MonoOptions,
    handler: &Handler,
) -> MonoResult<MonoModule> {
    let _span = info_span!("monomorphize_module", module = %source.name.as_str()).entered();

    let out = MonoModule::new(source.clone());
    let mut ctx = MonoCtx {
        source: &source,
        sema,
        symbols,
        options,
        handler,
        out,
        by_orig_sym: FxHashMap::default(),
        use_sites: FxHashMap::default(),
        call_sites: FxHashMap::default(),
        func_id_gen: InstanceFuncIdGenerator::new(),
        sym_id_gen: InstanceSymbolIdGenerator::new(),
        type_cache: FxHashMap::default(),
    };

    index(&mut ctx, inst_map);
    seed_non_generic_funcs(&mut ctx)?;
    seed_recorded_instantiations(&mut ctx, inst_map)?;
    register_type_instantiations(&mut ctx, inst_map)?;
    derive_used_types(&mut ctx);

    if ctx.options.enable_dce {
        run_dce(&mut ctx);
    }

    validate(&ctx)?;

    Ok(ctx.out)
}

// ---------------------------------------------------------------------
// Phase 1 — indexing
// ---------------------------------------------------------------------

fn index(ctx: &mut MonoCtx, inst_map: &InstantiationMap) {
    for (id, func) in ctx.source.funcs.iter_enumerated() {
        ctx.by_orig_sym.insert(func.symbol, id);
    }

    for entry in inst_map.entries_sorted() {
        for site in &entry.use_sites {
            ctx.use_sites.insert((entry.kind, site.caller, entry.symbol, site.span), entry.type_args.clone());
            ctx.call_sites.insert((entry.kind, site.caller, site.span), (entry.symbol, entry.type_args.clone()));
        }
    }
}

fn is_generic_func(func: &hir::Func, symbols: &SymbolResult, sema: &SemaResult) -> bool {
    if func.is_generic() {
        return true;
    }
    if symbols.get(func.symbol).is_generic() {
        return true;
    }
    let interner = &sema.interner;
    func.params.iter().any(|p| interner.get(p.ty).contains_generic_param(interner))
        || interner.get(func.result).contains_generic_param(interner)
}

// ---------------------------------------------------------------------
// Phase 2 — seed non-generic functions
// ---------------------------------------------------------------------

fn seed_non_generic_funcs(ctx: &mut MonoCtx) -> MonoResult<()> {
    let candidates: Vec<SymbolId> = ctx
        .source
        .funcs
        .iter()
        .filter(|f| !is_generic_func(f, ctx.symbols, ctx.sema))
        .map(|f| f.symbol)
        .collect();
    for symbol in candidates {
        let mut stack = Vec::new();
        ensure_func(ctx, symbol, Vec::new(), &mut stack)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Phase 3 — seed recorded instantiations
// ---------------------------------------------------------------------

fn seed_recorded_instantiations(ctx: &mut MonoCtx, inst_map: &InstantiationMap) -> MonoResult<()> {
    for entry in inst_map.entries_sorted() {
        if !matches!(entry.kind, InstKind::Fn | InstKind::Tag) {
            continue;
        }
        let interner = &ctx.sema.interner;
        if entry.type_args.iter().any(|&t| interner.get(t).contains_generic_param(interner)) {
            continue;
        }
        let mut stack = Vec::new();
        ensure_func(ctx, entry.symbol, entry.type_args.clone(), &mut stack)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Phase 4 — type instantiations
// ---------------------------------------------------------------------

fn register_type_instantiations(ctx: &mut MonoCtx, inst_map: &InstantiationMap) -> MonoResult<()> {
    for entry in inst_map.entries_sorted() {
        if entry.kind != InstKind::Type {
            continue;
        }
        let interner = &ctx.sema.interner;
        if entry.type_args.iter().any(|&t| interner.get(t).contains_generic_param(interner)) {
            continue;
        }
        instantiate_type(ctx, entry.symbol, &entry.type_args);
    }
    Ok(())
}

fn instantiate_type(ctx: &mut MonoCtx, type_symbol: SymbolId, type_args: &[TypeId]) {
    if ctx.out.has_type(type_symbol, type_args) {
        return;
    }
    let Some(decl) = ctx.source.types.iter().find(|d| d.symbol == type_symbol) else {
        return;
    };
    let canonical = ctx.symbols.get(type_symbol).declared_type;
    let generic_names: Vec<Symbol> = decl.generics.iter().map(|g| g.name).collect();

    let mut subst = Substitution::new();
    subst.add_owner(type_symbol, type_args.to_vec(), &generic_names);

    let specialized = substitute(&mut ctx.sema.interner, &subst, &mut ctx.type_cache, canonical);
    ctx.out.insert_type(type_symbol, type_args, MonoType { type_id: specialized });
}

// ---------------------------------------------------------------------
// Phase 5 — derive used types
// ---------------------------------------------------------------------

fn derive_used_types(ctx: &mut MonoCtx) {
    let funcs: Vec<DefId> = ctx.out.funcs_sorted().iter().map(|f| f.instance_id).collect();
    for instance_id in funcs {
        let Some(mono_func) = ctx.out.get_func(instance_id) else { continue };
        let body = mono_func.func.body.clone();
        record_nominal_types_in_block(ctx, &body);
    }
}

fn record_nominal_types_in_block(ctx: &mut MonoCtx, block: &Block) {
    hir::visit_exprs_in_block(block, &mut |expr| {
        record_nominal_type(ctx, expr.ty);
    });
}

fn record_nominal_type(ctx: &mut MonoCtx, ty: TypeId) {
    if ty == TypeId::NONE {
        return;
    }
    let (def, args) = match ctx.sema.interner.get(ty) {
        Type::Struct { def, args, .. } | Type::Union { def, args, .. } | Type::Alias { def, args, .. } => {
            (*def, args.clone())
        }
        _ => return,
    };
    if args.is_empty() {
        return;
    }
    if !ctx.out.has_type(def, &args) {
        ctx.out.insert_type(def, &args, MonoType { type_id: ty });
    }
}

// ---------------------------------------------------------------------
// ensure_func
// ---------------------------------------------------------------------

/// Creates at most one `MonoFunc` per `(orig_sym, args_key)` (spec.md
/// §4.5). `stack` is the chain of `(orig_sym, args_key)` currently being
/// instantiated, used for cycle detection and depth limiting.
fn ensure_func(ctx: &mut MonoCtx, orig_sym: SymbolId, type_args: Vec<TypeId>, stack: &mut Vec<(SymbolId, String)>) -> MonoResult<DefId> {
    let args_key = args_key_from_types(&type_args);

    if let Some(existing) = ctx.out.get_func_by_key(orig_sym, &args_key) {
        return Ok(existing.instance_id);
    }

    let func_id = *ctx
        .by_orig_sym
        .get(&orig_sym)
        .ok_or(MonoError::UnresolvedCallee { site: Span::DUMMY })?;
    let orig_func = ctx.source.func(func_id).clone();

    if !orig_func.is_generic() && !type_args.is_empty() {
        return Err(MonoError::NonGenericWithArgs { symbol: orig_sym, got: type_args.len() });
    }
    if orig_func.is_generic() && type_args.len() != orig_func.generics.len() {
        return Err(MonoError::WrongArity { symbol: orig_sym, expected: orig_func.generics.len(), got: type_args.len() });
    }
    {
        let interner = &ctx.sema.interner;
        if type_args.iter().any(|&t| interner.get(t).contains_generic_param(interner)) {
            return Err(MonoError::UnresolvedGenericParam {
                symbol: orig_sym,
                stack: stack.iter().map(|(s, k)| format!("{s}::<{k}>")).collect(),
            });
        }
    }

    let stack_key = (orig_sym, args_key.clone());
    if stack.contains(&stack_key) {
        return Err(MonoError::InstantiationCycle {
            symbol: orig_sym,
            args_key,
            stack: stack.iter().map(|(s, k)| format!("{s}::<{k}>")).collect(),
        });
    }
    if stack.len() >= ctx.options.max_depth {
        return Err(MonoError::DepthExceeded {
            limit: ctx.options.max_depth,
            stack: stack.iter().map(|(s, k)| format!("{s}::<{k}>")).collect(),
        });
    }
    stack.push(stack_key);

    let result = build_instance(ctx, &orig_func, orig_sym, type_args, &args_key, stack);

    stack.pop();
    result
}

fn build_instance(
    ctx: &mut MonoCtx,
    orig_func: &hir::Func,
    orig_sym: SymbolId,
    type_args: Vec<TypeId>,
    args_key: &str,
    stack: &mut Vec<(SymbolId, String)>,
) -> MonoResult<DefId> {
    let instance_id = ctx.func_id_gen.next();
    let instance_sym = ctx.sym_id_gen.next();

    let mut clone = orig_func.clone();
    clone.generics.clear();
    clone.symbol = instance_sym;
    clone.borrow_graph = None;
    clone.move_plan = None;
    clone.name = mono_name(&ctx.sema.interner, orig_func.name, &type_args);

    let mut subst = Substitution::new();
    let generic_names: Vec<Symbol> = orig_func.generics.iter().map(|g| g.name).collect();
    subst.add_owner(orig_sym, type_args.clone(), &generic_names);

    if let Some(receiver_ty) = ctx.symbols.get(orig_sym).receiver_key {
        if let Some((receiver_def, receiver_names)) = receiver_owner(ctx, receiver_ty) {
            subst.add_owner(receiver_def, type_args.clone(), &receiver_names);
        }
    }

    substitute_func(ctx, &subst, &mut clone);
    rewrite_calls_in_block(ctx, &subst, orig_sym, stack, &mut clone.body)?;

    let mono_func = MonoFunc { instance_id, original_symbol: orig_sym, type_args, func: clone };
    ctx.out.insert_func(mono_func);
    debug!(symbol = %orig_sym, args_key, "instantiated function");
    Ok(instance_id)
}

fn receiver_owner(ctx: &MonoCtx, receiver_ty: TypeId) -> Option<(DefId, Vec<Symbol>)> {
    let def = match ctx.sema.interner.get(receiver_ty) {
        Type::Struct { def, .. } | Type::Union { def, .. } | Type::Alias { def, .. } => *def,
        _ => return None,
    };
    let names = ctx
        .source
        .types
        .iter()
        .find(|d| d.symbol == def)
        .map(|d| d.generics.iter().map(|g| g.name).collect())
        .unwrap_or_default();
    Some((def, names))
}

fn mono_name(interner: &vela_sema::TypeInterner, base: Symbol, type_args: &[TypeId]) -> Symbol {
    if type_args.is_empty() {
        return base;
    }
    let rendered: Vec<String> = type_args.iter().map(|&t| format_type(interner, t)).collect();
    Symbol::intern(&format!("{}::<{}>", base.as_str(), rendered.join(", ")))
}

// ---------------------------------------------------------------------
// Substitution application over a function's signature and body
// ---------------------------------------------------------------------

fn substitute_func(ctx: &mut MonoCtx, subst: &Substitution, func: &mut hir::Func) {
    for param in &mut func.params {
        param.ty = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, param.ty);
        param.ownership = vela_hir::ownership::classify(&ctx.sema.interner, param.ty);
        if let Some(default) = &mut param.default {
            substitute_expr(ctx, subst, default);
        }
    }
    func.result = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, func.result);
    substitute_block(ctx, subst, &mut func.body);
}

fn substitute_block(ctx: &mut MonoCtx, subst: &Substitution, block: &mut Block) {
    for stmt in &mut block.stmts {
        substitute_stmt(ctx, subst, stmt);
    }
}

fn substitute_stmt(ctx: &mut MonoCtx, subst: &Substitution, stmt: &mut Stmt) {
    match stmt {
        Stmt::Let { ty, value, ownership, .. } => {
            *ty = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, *ty);
            *ownership = vela_hir::ownership::classify(&ctx.sema.interner, *ty);
            if let Some(v) = value {
                substitute_expr(ctx, subst, v);
            }
        }
        Stmt::Expr(e) => substitute_expr(ctx, subst, e),
        Stmt::Assign { target, value } => {
            substitute_expr(ctx, subst, target);
            substitute_expr(ctx, subst, value);
        }
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                substitute_expr(ctx, subst, v);
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
        Stmt::If { cond, then_block, else_block } => {
            substitute_expr(ctx, subst, cond);
            substitute_block(ctx, subst, then_block);
            if let Some(b) = else_block {
                substitute_block(ctx, subst, b);
            }
        }
        Stmt::While { cond, body } => {
            substitute_expr(ctx, subst, cond);
            substitute_block(ctx, subst, body);
        }
        Stmt::For { body, .. } => substitute_block(ctx, subst, body),
        Stmt::Block(b) => substitute_block(ctx, subst, b),
        Stmt::Drop { value } => substitute_expr(ctx, subst, value),
    }
}

fn substitute_expr(ctx: &mut MonoCtx, subst: &Substitution, expr: &mut Expr) {
    expr.ty = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, expr.ty);
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef { .. } => {}
        ExprKind::UnaryOp { operand, .. } => substitute_expr(ctx, subst, operand),
        ExprKind::BinaryOp { left, right, .. } => {
            substitute_expr(ctx, subst, left);
            substitute_expr(ctx, subst, right);
        }
        ExprKind::Call { callee, args } => {
            substitute_expr(ctx, subst, callee);
            for a in args {
                substitute_expr(ctx, subst, a);
            }
        }
        ExprKind::FieldAccess { object, .. } => substitute_expr(ctx, subst, object),
        ExprKind::Index { object, index } => {
            substitute_expr(ctx, subst, object);
            substitute_expr(ctx, subst, index);
        }
        ExprKind::StructLit { fields, .. } => {
            for (_, v) in fields {
                substitute_expr(ctx, subst, v);
            }
        }
        ExprKind::ArrayLit { elements } | ExprKind::TupleLit { elements } => {
            for e in elements {
                substitute_expr(ctx, subst, e);
            }
        }
        ExprKind::Compare { subject, arms } => {
            substitute_expr(ctx, subst, subject);
            for arm in arms {
                if let Some(guard) = &mut arm.guard {
                    substitute_expr(ctx, subst, guard);
                }
                substitute_expr(ctx, subst, &mut arm.result);
            }
        }
        ExprKind::TagTest { subject, .. } | ExprKind::TagPayload { subject, .. } => substitute_expr(ctx, subst, subject),
        ExprKind::IterInit { iterable } => substitute_expr(ctx, subst, iterable),
        ExprKind::IterNext { iterator } => substitute_expr(ctx, subst, iterator),
        ExprKind::If { cond, then_expr, else_expr } => {
            substitute_expr(ctx, subst, cond);
            substitute_expr(ctx, subst, then_expr);
            if let Some(e) = else_expr {
                substitute_expr(ctx, subst, e);
            }
        }
        ExprKind::Await { value } | ExprKind::Spawn { body: value } | ExprKind::Async { body: value } => {
            substitute_expr(ctx, subst, value)
        }
        ExprKind::Cast { value, target } => {
            substitute_expr(ctx, subst, value);
            *target = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, *target);
        }
        ExprKind::Block(block) => substitute_block(ctx, subst, block),
    }
}

// ---------------------------------------------------------------------
// Call-site rewriting (spec.md §4.5 "Call-site rewriting")
// ---------------------------------------------------------------------

fn rewrite_calls_in_block(
    ctx: &mut MonoCtx,
    subst: &Substitution,
    caller_sym: SymbolId,
    stack: &mut Vec<(SymbolId, String)>,
    block: &mut Block,
) -> MonoResult<()> {
    for stmt in &mut block.stmts {
        rewrite_calls_in_stmt(ctx, subst, caller_sym, stack, stmt)?;
    }
    Ok(())
}

fn rewrite_calls_in_stmt(
    ctx: &mut MonoCtx,
    subst: &Substitution,
    caller_sym: SymbolId,
    stack: &mut Vec<(SymbolId, String)>,
    stmt: &mut Stmt,
) -> MonoResult<()> {
    match stmt {
        Stmt::Let { value: Some(v), .. } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, v),
        Stmt::Let { value: None, .. } => Ok(()),
        Stmt::Expr(e) => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, e),
        Stmt::Assign { target, value } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, target)?;
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, value)
        }
        Stmt::Return { value: Some(v), .. } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, v),
        Stmt::Return { value: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } => Ok(()),
        Stmt::If { cond, then_block, else_block } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, cond)?;
            rewrite_calls_in_block(ctx, subst, caller_sym, stack, then_block)?;
            if let Some(b) = else_block {
                rewrite_calls_in_block(ctx, subst, caller_sym, stack, b)?;
            }
            Ok(())
        }
        Stmt::While { cond, body } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, cond)?;
            rewrite_calls_in_block(ctx, subst, caller_sym, stack, body)
        }
        Stmt::For { body, .. } => rewrite_calls_in_block(ctx, subst, caller_sym, stack, body),
        Stmt::Block(b) => rewrite_calls_in_block(ctx, subst, caller_sym, stack, b),
        Stmt::Drop { value } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, value),
    }
}

fn rewrite_calls_in_expr(
    ctx: &mut MonoCtx,
    subst: &Substitution,
    caller_sym: SymbolId,
    stack: &mut Vec<(SymbolId, String)>,
    expr: &mut Expr,
) -> MonoResult<()> {
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef { .. } => {}
        ExprKind::UnaryOp { operand, .. } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, operand)?,
        ExprKind::BinaryOp { left, right, .. } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, left)?;
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, right)?;
        }
        ExprKind::Call { callee, args } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, callee)?;
            for a in args.iter_mut() {
                rewrite_calls_in_expr(ctx, subst, caller_sym, stack, a)?;
            }
            resolve_call(ctx, subst, caller_sym, stack, expr)?;
        }
        ExprKind::FieldAccess { object, .. } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, object)?,
        ExprKind::Index { object, index } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, object)?;
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, index)?;
        }
        ExprKind::StructLit { fields, .. } => {
            for (_, v) in fields.iter_mut() {
                rewrite_calls_in_expr(ctx, subst, caller_sym, stack, v)?;
            }
        }
        ExprKind::ArrayLit { elements } | ExprKind::TupleLit { elements } => {
            for e in elements.iter_mut() {
                rewrite_calls_in_expr(ctx, subst, caller_sym, stack, e)?;
            }
        }
        ExprKind::Compare { subject, arms } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, subject)?;
            for arm in arms.iter_mut() {
                if let Some(guard) = &mut arm.guard {
                    rewrite_calls_in_expr(ctx, subst, caller_sym, stack, guard)?;
                }
                rewrite_calls_in_expr(ctx, subst, caller_sym, stack, &mut arm.result)?;
            }
        }
        ExprKind::TagTest { subject, .. } | ExprKind::TagPayload { subject, .. } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, subject)?
        }
        ExprKind::IterInit { iterable } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, iterable)?,
        ExprKind::IterNext { iterator } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, iterator)?,
        ExprKind::If { cond, then_expr, else_expr } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, cond)?;
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, then_expr)?;
            if let Some(e) = else_expr {
                rewrite_calls_in_expr(ctx, subst, caller_sym, stack, e)?;
            }
        }
        ExprKind::Await { value } | ExprKind::Spawn { body: value } | ExprKind::Async { body: value } => {
            rewrite_calls_in_expr(ctx, subst, caller_sym, stack, value)?
        }
        ExprKind::Cast { value, .. } => rewrite_calls_in_expr(ctx, subst, caller_sym, stack, value)?,
        ExprKind::Block(block) => rewrite_calls_in_block(ctx, subst, caller_sym, stack, block)?,
    }
    Ok(())
}

/// `expr.kind` is `ExprKind::Call { .. }` on entry; may rewrite the
/// callee in place or, for a `clone` on a copy-typed receiver, replace
/// `expr` wholesale with its own argument (spec.md §4.5 step 6).
fn resolve_call(
    ctx: &mut MonoCtx,
    subst: &Substitution,
    caller_sym: SymbolId,
    stack: &mut Vec<(SymbolId, String)>,
    expr: &mut Expr,
) -> MonoResult<()> {
    let span = expr.span;

    // Bound-method conversion: a receiver the lowerer could not resolve
    // to a direct call survives as a plain field access.
    if let ExprKind::Call { callee, .. } = &mut expr.kind {
        if let ExprKind::FieldAccess { object, field } = &callee.kind {
            let receiver_ty = object.ty;
            let field = *field;
            match ctx.symbols.methods_for_receiver(receiver_ty).iter().copied().find(|&s| ctx.symbols.get(s).name == field) {
                Some(method_sym) => {
                    debug!(method = %field.as_str(), "resolved bound method call during monomorphization");
                    **callee = Expr { id: callee.id, kind: ExprKind::VarRef { symbol: method_sym, name: field }, ty: callee.ty, span: callee.span };
                }
                None => {
                    ctx.handler.warning(format!("could not resolve method `{}`", field.as_str()), span);
                    return Err(MonoError::UnresolvedCallee { site: span });
                }
            }
        }
    }

    let (ref_symbol, callee_name) = match &expr.kind {
        ExprKind::Call { callee, .. } => match &callee.kind {
            ExprKind::VarRef { symbol, name } => (*symbol, *name),
            _ => return Err(MonoError::UnresolvedCallee { site: span }),
        },
        _ => unreachable!("resolve_call only ever receives a Call expression"),
    };

    // Clone intrinsic the lowerer could not statically resolve (receiver
    // type was still a generic parameter at lowering time).
    if ref_symbol.is_dummy() && callee_name.as_str() == "__clone" {
        return resolve_clone_call(ctx, stack, expr);
    }

    // Callee determination (spec.md §4.5 step 2): the `callSites` index,
    // keyed by (caller, span), pins the exact resolved callee symbol —
    // critical for overloaded functions, where the `VarRef`'s own symbol
    // may still point at an unresolved overload set. Only fall back to
    // the `VarRef`'s symbol when no call-site entry exists.
    let call_site = ctx.call_sites.get(&(InstKind::Fn, Some(caller_sym), span));
    let callee_symbol = call_site.map(|(sym, _)| *sym).unwrap_or(ref_symbol);

    if ctx.symbols.get(callee_symbol).kind == SymbolKind::Tag {
        // Tag constructors need no symbol rewriting; the constructed
        // union's concrete instance is picked up by derive_used_types.
        return Ok(());
    }

    let mut type_args = call_site
        .map(|(_, args)| args.clone())
        .or_else(|| ctx.use_sites.get(&(InstKind::Fn, Some(caller_sym), callee_symbol, span)).cloned())
        .unwrap_or_default();
    for t in &mut type_args {
        *t = substitute(&mut ctx.sema.interner, subst, &mut ctx.type_cache, *t);
    }

    let instance_id = ensure_func(ctx, callee_symbol, type_args, stack)?;
    let (instance_sym, instance_name) = {
        let instance = ctx.out.get_func(instance_id).expect("ensure_func just inserted this instance");
        (instance.instance_symbol(), instance.func.name)
    };
    if let ExprKind::Call { callee, .. } = &mut expr.kind {
        **callee = Expr { id: callee.id, kind: ExprKind::VarRef { symbol: instance_sym, name: instance_name }, ty: callee.ty, span: callee.span };
    }
    Ok(())
}

fn resolve_clone_call(ctx: &mut MonoCtx, stack: &mut Vec<(SymbolId, String)>, expr: &mut Expr) -> MonoResult<()> {
    let ExprKind::Call { args, .. } = &mut expr.kind else { unreachable!() };
    let receiver_ty = args.first().map(|a| a.ty).unwrap_or(TypeId::NONE);

    if ctx.sema.is_copy_type(receiver_ty) {
        let mut replacement = args.remove(0);
        if let ExprKind::UnaryOp { op: UnOp::Ref { .. }, operand } = replacement.kind {
            replacement = *operand;
        }
        replacement.ty = expr.ty;
        *expr = replacement;
        return Ok(());
    }

    let Some(method_sym) =
        ctx.symbols.methods_for_receiver(receiver_ty).iter().copied().find(|&s| ctx.symbols.get(s).name.as_str() == "__clone")
    else {
        return Err(MonoError::MissingCloneMethod { type_name: format_type(&ctx.sema.interner, receiver_ty) });
    };

    let instance_id = ensure_func(ctx, method_sym, Vec::new(), stack)?;
    let (instance_sym, instance_name) = {
        let instance = ctx.out.get_func(instance_id).expect("ensure_func just inserted this instance");
        (instance.instance_symbol(), instance.func.name)
    };
    if let ExprKind::Call { callee, .. } = &mut expr.kind {
        **callee = Expr { id: callee.id, kind: ExprKind::VarRef { symbol: instance_sym, name: instance_name }, ty: callee.ty, span: callee.span };
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Dead-instance elimination (optional)
// ---------------------------------------------------------------------

fn run_dce(ctx: &mut MonoCtx) {
    let funcs = ctx.out.funcs_sorted();
    let mut roots: Vec<DefId> = Vec::new();
    for f in &funcs {
        let is_entry_or_public = f.func.flags.contains(hir::FuncFlags::ENTRYPOINT) || f.func.flags.contains(hir::FuncFlags::PUBLIC);
        let is_main = f.func.name.as_str() == "main";
        if (is_entry_or_public && f.type_args.is_empty()) || is_main {
            roots.push(f.instance_id);
        }
    }

    let mut reachable: HashSet<DefId> = HashSet::new();
    let mut frontier = roots;
    while let Some(id) = frontier.pop() {
        if !reachable.insert(id) {
            continue;
        }
        let Some(f) = ctx.out.get_func(id) else { continue };
        for callee_sym in called_symbols(&f.func.body) {
            if let Some(callee) = ctx.out.get_func_by_instance_symbol(callee_sym) {
                if !reachable.contains(&callee.instance_id) {
                    frontier.push(callee.instance_id);
                }
            }
        }
    }

    let dropped = funcs.len() - reachable.len();
    if dropped > 0 {
        for f in &funcs {
            if !reachable.contains(&f.instance_id) {
                ctx.handler.warning(format!("dropping unreachable instance `{}`", f.func.name.as_str()), f.func.span);
            }
        }
        warn!(dropped, "dead-instance elimination removed unreachable instances");
    }

    ctx.out.retain_funcs(&reachable);
    ctx.out.clear_types();
    derive_used_types(ctx);
}

fn called_symbols(block: &Block) -> Vec<SymbolId> {
    let mut out = Vec::new();
    hir::visit_exprs_in_block(block, &mut |expr| {
        if let ExprKind::Call { callee, .. } = &expr.kind {
            if let ExprKind::VarRef { symbol, .. } = &callee.kind {
                out.push(*symbol);
            }
        }
    });
    out
}

// ---------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------

fn validate(ctx: &MonoCtx) -> MonoResult<()> {
    for f in ctx.out.funcs_sorted() {
        let interner = &ctx.sema.interner;
        for param in &f.func.params {
            if interner.get(param.ty).contains_generic_param(interner) {
                return Err(MonoError::ResidualGenericParam { func: f.original_symbol, type_id: param.ty });
            }
        }
        if interner.get(f.func.result).contains_generic_param(interner) {
            return Err(MonoError::ResidualGenericParam { func: f.original_symbol, type_id: f.func.result });
        }
        if let Some(bad) = first_generic_type_in_block(interner, &f.func.body) {
            return Err(MonoError::ResidualGenericParam { func: f.original_symbol, type_id: bad });
        }
    }
    Ok(())
}

fn first_generic_type_in_block(interner: &vela_sema::TypeInterner, block: &Block) -> Option<TypeId> {
    block.stmts.iter().find_map(|s| first_generic_type_in_stmt(interner, s))
}

fn first_generic_type_in_stmt(interner: &vela_sema::TypeInterner, stmt: &Stmt) -> Option<TypeId> {
    match stmt {
        Stmt::Let { ty, value, .. } => {
            if interner.get(*ty).contains_generic_param(interner) {
                return Some(*ty);
            }
            value.as_ref().and_then(|v| first_generic_type_in_expr(interner, v))
        }
        Stmt::Expr(e) => first_generic_type_in_expr(interner, e),
        Stmt::Assign { target, value } => {
            first_generic_type_in_expr(interner, target).or_else(|| first_generic_type_in_expr(interner, value))
        }
        Stmt::Return { value, .. } => value.as_ref().and_then(|v| first_generic_type_in_expr(interner, v)),
        Stmt::Break { .. } | Stmt::Continue { .. } => None,
        Stmt::If { cond, then_block, else_block } => first_generic_type_in_expr(interner, cond)
            .or_else(|| first_generic_type_in_block(interner, then_block))
            .or_else(|| else_block.as_ref().and_then(|b| first_generic_type_in_block(interner, b))),
        Stmt::While { cond, body } => {
            first_generic_type_in_expr(interner, cond).or_else(|| first_generic_type_in_block(interner, body))
        }
        Stmt::For { body, .. } => first_generic_type_in_block(interner, body),
        Stmt::Block(b) => first_generic_type_in_block(interner, b),
        Stmt::Drop { value } => first_generic_type_in_expr(interner, value),
    }
}

fn first_generic_type_in_expr(interner: &vela_sema::TypeInterner, expr: &Expr) -> Option<TypeId> {
    let mut found = None;
    hir::visit_exprs(expr, &mut |e| {
        if found.is_none() && interner.get(e.ty).contains_generic_param(interner) {
            found = Some(e.ty);
        }
    });
    found
}
