//! HIR Lowerer (spec.md §4.1): a total, structural, item-by-item
//! translation from the AST to [`crate::hir::Module`].
//!
//! Name resolution is an external collaborator this workspace does not
//! implement, and our [`vela_ast::ast`] types carry no per-node resolved
//! symbol id the way a real resolver's output would. So the lowerer mints
//! its own [`SymbolId`]s for `let`/parameter bindings as it walks each
//! function body, through a lexical scope stack it owns locally, and
//! resolves declared type annotations (`Param.ty`, `ret_type`, ...)
//! directly against `sema`'s [`TypeInterner`] rather than through a
//! pre-populated per-declaration table. Every *expression*'s type still
//! comes from `sema.type_of_expr`, exactly as specified — only the
//! symbol/type-annotation machinery around it is locally scaffolded.

use crate::hir::{
    BinOp as HBinOp, Block, CompareArm, ConstDecl, Expr as HExpr, ExprKind, ForKind, Func, FuncFlags, GenericParam as HGenericParam,
    GlobalDecl, Literal as HLiteral, Module, Ownership, Param as HParam, Pattern as HPattern, Stmt as HStmt, TypeDecl, UnOp as HUnOp,
};
use crate::ownership::classify;
use rustc_hash::FxHashMap;
use vela_ast::{ast, Builder};
use vela_sema::{ExprId, ImplicitConversion, SemaResult, SymbolId, SymbolKind, SymbolResult, Type, TypeId};
use vela_util::{DefIdGenerator, FileId, Span, Symbol};

struct LowerCtx<'a> {
    symbols: &'a SymbolResult,
    sema: &'a mut SemaResult,
    def_gen: DefIdGenerator,
    next_expr: u32,
    scopes: Vec<FxHashMap<Symbol, SymbolId>>,
    fresh_counter: u32,
}

impl<'a> LowerCtx<'a> {
    fn new(symbols: &'a SymbolResult, sema: &'a mut SemaResult) -> Self {
        Self { symbols, sema, def_gen: DefIdGenerator::new(), next_expr: 0, scopes: vec![FxHashMap::default()], fresh_counter: 0 }
    }

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: Symbol) -> SymbolId {
        let id = self.def_gen.next();
        self.scopes.last_mut().expect("at least one scope").insert(name, id);
        id
    }

    fn resolve(&self, name: Symbol) -> Option<SymbolId> {
        self.scopes.iter().rev().find_map(|s| s.get(&name).copied())
    }

    fn fresh_name(&mut self, prefix: &str) -> Symbol {
        self.fresh_counter += 1;
        Symbol::intern(&format!("__{}{}", prefix, self.fresh_counter))
    }

    fn next_expr_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr);
        self.next_expr += 1;
        id
    }

    fn expr_type_for(&self, id: ExprId) -> TypeId {
        self.sema.type_of_expr(id)
    }

    /// Finds the symbol table entry for `name` with the given `kind`,
    /// scanning in declaration order (first match wins) since this
    /// workspace models only a single file scope worth of top-level
    /// declarations.
    fn find_symbol(&self, name: Symbol, kind: SymbolKind) -> Option<SymbolId> {
        self.symbols.iter().find(|(_, e)| e.kind == kind && e.name == name).map(|(id, _)| id)
    }
}

/// Resolves an AST type annotation to a [`TypeId`], interning any shape
/// not already canonical. Best-effort: an unrecognized nominal path
/// becomes a zero-argument, zero-field stub rather than failing, matching
/// the lowerer's "never invents types, never errors" contract for the
/// expression side — declared-type annotations are syntax, not inference
/// output, so a stub here is not "inventing" a type, only naming one.
fn resolve_type(sema: &mut SemaResult, ty: &ast::Type) -> TypeId {
    match ty {
        ast::Type::Unit => sema.interner.intern(Type::Unit),
        ast::Type::Never => sema.interner.intern(Type::Nothing),
        ast::Type::Inferred => TypeId::NONE,
        ast::Type::Path(path) => resolve_named_type(sema, path, &[]),
        ast::Type::Generic(base, args) => {
            if let ast::Type::Path(path) = base.as_ref() {
                resolve_named_type(sema, path, args)
            } else {
                resolve_type(sema, base)
            }
        }
        ast::Type::Reference(inner, m) => {
            let inner = resolve_type(sema, inner);
            sema.interner.intern(Type::Reference { inner, mutable: matches!(m, ast::Mutability::Mutable) })
        }
        ast::Type::Pointer(inner, _) => {
            let inner = resolve_type(sema, inner);
            sema.interner.intern(Type::Pointer(inner))
        }
        ast::Type::Own(inner) => {
            let inner = resolve_type(sema, inner);
            sema.interner.intern(Type::Own(inner))
        }
        ast::Type::Slice(inner) => {
            let elem = resolve_type(sema, inner);
            sema.interner.intern(Type::Array { elem, len: None })
        }
        ast::Type::Array(inner, n) => {
            let elem = resolve_type(sema, inner);
            sema.interner.intern(Type::Array { elem, len: Some(*n) })
        }
        ast::Type::Tuple(elems) => {
            let ids = elems.iter().map(|t| resolve_type(sema, t)).collect();
            sema.interner.intern(Type::Tuple(ids))
        }
        ast::Type::Fn(params, ret) => {
            let params = params.iter().map(|t| resolve_type(sema, t)).collect();
            let result = resolve_type(sema, ret);
            sema.interner.intern(Type::Fn { params, result })
        }
        // Trait objects/`impl Trait` require a vtable/existential model this
        // workspace's mid-end never needs to see concretely.
        ast::Type::TraitObject(_) | ast::Type::ImplTrait(_) => TypeId::NONE,
    }
}

fn resolve_named_type(sema: &mut SemaResult, path: &ast::Path, extra_args: &[ast::Type]) -> TypeId {
    let last = path.segments.last().expect("non-empty path");
    if let Some(builtin) = builtin_type_for_name(last.ident) {
        return sema.interner.intern(builtin);
    }
    let mut args: Vec<TypeId> = last.args.iter().flatten().map(|t| resolve_type(sema, t)).collect();
    args.extend(extra_args.iter().map(|t| resolve_type(sema, t)));
    sema.interner.intern(Type::Struct { name: last.ident, def: vela_util::DefId::DUMMY, args, fields: Vec::new() })
}

fn builtin_type_for_name(name: Symbol) -> Option<Type> {
    Some(match name.as_str() {
        "int" => Type::Int64,
        "int8" => Type::Int8,
        "int16" => Type::Int16,
        "int32" => Type::Int32,
        "isize" => Type::Isize,
        "uint8" => Type::UInt8,
        "uint16" => Type::UInt16,
        "uint32" => Type::UInt32,
        "uint64" => Type::UInt64,
        "usize" => Type::Usize,
        "float" => Type::Float64,
        "float32" => Type::Float32,
        "bool" => Type::Bool,
        "char" => Type::Char,
        "string" => Type::String,
        "nothing" => Type::Nothing,
        _ => return None,
    })
}

/// Lowers one source file into a [`Module`]. Runs the normalizer
/// internally before returning, per spec.md §6 ("a `Module` ... already
/// normalized by the lowerer, which itself runs normalization before
/// returning"). Takes the AST `Builder` the parser assembled (spec.md §6's
/// documented input to lowering), not a bare item list: `builder.items()`
/// are the module's own top-level items, `builder.extern_members()` are
/// lowered the same way (an `extern` block's members are ordinary items
/// once lowering sees them, just declared outside the module body).
pub fn lower_module(
    builder: &Builder,
    name: Symbol,
    path: impl Into<String>,
    file_id: FileId,
    symbols: &SymbolResult,
    sema: &mut SemaResult,
) -> Module {
    let mut module = Module::new(name, path, file_id);
    let mut ctx = LowerCtx::new(symbols, sema);
    for item in builder.items().iter().chain(builder.extern_members()) {
        lower_item(&mut ctx, item, &mut module);
    }
    for func in module.funcs.as_mut_slice() {
        let (body, graph, plan) = crate::normalize::normalize_and_lift(func, ctx.sema, &ctx.def_gen);
        func.body = body;
        func.borrow_graph = Some(graph);
        func.move_plan = Some(plan);
    }
    module
}

fn lower_item(ctx: &mut LowerCtx, item: &ast::Item, module: &mut Module) {
    match item {
        ast::Item::Fn(f) => {
            let func = lower_fn_item(ctx, f);
            push_func_with_real_id(module, func);
        }
        ast::Item::Struct(s) => module.types.push(TypeDecl {
            name: s.name,
            symbol: ctx.find_symbol(s.name, SymbolKind::Type).unwrap_or(vela_util::DefId::DUMMY),
            generics: s.generics.iter().map(|g| lower_generic_param(ctx, g)).collect(),
        }),
        ast::Item::Enum(e) => module.types.push(TypeDecl {
            name: e.name,
            symbol: ctx.find_symbol(e.name, SymbolKind::Type).unwrap_or(vela_util::DefId::DUMMY),
            generics: e.generics.iter().map(|g| lower_generic_param(ctx, g)).collect(),
        }),
        ast::Item::Const(c) => {
            let ty = c.ty.as_ref().map(|t| resolve_type(ctx.sema, t)).unwrap_or(TypeId::NONE);
            let symbol = ctx.bind(c.name);
            let value = match &c.value {
                Some(v) => lower_expr(ctx, v),
                None => default_value_call(ctx, ty, c.span),
            };
            module.constants.push(ConstDecl { name: c.name, symbol, ty, value });
        }
        ast::Item::Static(s) => {
            let ty = resolve_type(ctx.sema, &s.ty);
            let symbol = ctx.bind(s.name);
            module.globals.push(GlobalDecl { name: s.name, symbol, ty, init: Some(lower_expr(ctx, &s.value)) });
        }
        // Traits/impls/use items lower into `Func`s via their own members
        // (methods) or carry no HIR-level representation of their own.
        ast::Item::Trait(_) | ast::Item::Impl(_) | ast::Item::Use(_) => {
            if let ast::Item::Impl(imp) = item {
                for member in &imp.items {
                    if let ast::ImplMember::Method(f) = member {
                        let func = lower_fn_item(ctx, f);
                        push_func_with_real_id(module, func);
                    }
                }
            }
        }
    }
}

/// `Module::push_func` assigns the real, dense `FuncId` (spec.md §3:
/// "monotonically assigned from 1"); the placeholder id set while
/// building `func` is only there to satisfy the struct literal and gets
/// overwritten here with the id the arena actually handed out.
fn push_func_with_real_id(module: &mut Module, func: Func) {
    let id = module.push_func(func);
    if let Some(stored) = module.funcs.get_mut(id) {
        stored.id = id;
    }
}

fn lower_generic_param(ctx: &mut LowerCtx, g: &ast::GenericParam) -> HGenericParam {
    HGenericParam { name: g.name, bounds: g.bounds.iter().map(|t| resolve_type(ctx.sema, t)).collect() }
}

fn lower_fn_item(ctx: &mut LowerCtx, f: &ast::FnItem) -> Func {
    ctx.push_scope();
    let symbol = ctx.find_symbol(f.name, SymbolKind::Function).unwrap_or_else(|| ctx.def_gen.next());
    let generics: Vec<HGenericParam> = f.generics.iter().map(|g| lower_generic_param(ctx, g)).collect();

    let mut params = Vec::with_capacity(f.params.len());
    for p in &f.params {
        let ty = p.ty.as_ref().map(|t| resolve_type(ctx.sema, t)).unwrap_or(TypeId::NONE);
        let param_symbol = ctx.bind(p.name);
        let ownership = classify(&ctx.sema.interner, ty);
        let default = match &p.default {
            Some(e) => Some(lower_expr(ctx, e)),
            None => None,
        };
        params.push(HParam { name: p.name, symbol: param_symbol, ty, ownership, default, has_default: p.has_default() });
    }

    let result = f.ret_type.as_ref().map(|t| resolve_type(ctx.sema, t)).unwrap_or_else(|| ctx.sema.interner.intern(Type::Nothing));

    let mut flags = FuncFlags::empty();
    if f.async_kw {
        flags |= FuncFlags::ASYNC;
    }
    if f.visibility == ast::Visibility::Public {
        flags |= FuncFlags::PUBLIC;
    }
    for attr in &f.attrs {
        match attr.as_str() {
            "entrypoint" => flags |= FuncFlags::ENTRYPOINT,
            "intrinsic" => flags |= FuncFlags::INTRINSIC,
            "failfast" => flags |= FuncFlags::FAILFAST,
            "overload" => flags |= FuncFlags::OVERLOAD,
            "override" => flags |= FuncFlags::OVERRIDE,
            _ => {}
        }
    }
    if f.name.as_str() == "main" {
        flags |= FuncFlags::ENTRYPOINT;
    }

    let mut body = lower_block(ctx, &f.body);
    enforce_return_semantics(ctx, &mut body, result);
    ctx.pop_scope();

    Func { id: crate::hir::FuncId(1), name: f.name, symbol, span: f.span, generics, params, result, flags, body, borrow_graph: None, move_plan: None }
}

/// Enforces the trailing-return invariant (spec.md §3, Testable Property 2):
/// a function body always ends with `Return`. If `result` is `nothing`, the
/// appended return carries no value; otherwise a trailing expression
/// statement is promoted to a tail return.
fn enforce_return_semantics(ctx: &mut LowerCtx, block: &mut Block, result: TypeId) {
    let is_nothing = matches!(ctx.sema.interner.get(result), Type::Nothing);
    let already_returns = matches!(block.stmts.last(), Some(HStmt::Return { .. }));
    if already_returns {
        return;
    }
    if is_nothing {
        block.stmts.push(HStmt::Return { value: None, is_tail: true, span: block.span });
        return;
    }
    match block.stmts.pop() {
        Some(HStmt::Expr(expr)) => {
            let span = expr.span;
            block.stmts.push(HStmt::Return { value: Some(expr), is_tail: true, span });
        }
        Some(other) => {
            block.stmts.push(other);
            block.stmts.push(HStmt::Return { value: None, is_tail: true, span: block.span });
        }
        None => {
            block.stmts.push(HStmt::Return { value: None, is_tail: true, span: block.span });
        }
    }
}

fn lower_block(ctx: &mut LowerCtx, block: &ast::Block) -> Block {
    ctx.push_scope();
    let mut stmts = Vec::with_capacity(block.stmts.len() + 1);
    for stmt in &block.stmts {
        lower_stmt(ctx, stmt, &mut stmts);
    }
    if let Some(trailing) = &block.trailing {
        let expr = lower_expr(ctx, trailing);
        stmts.push(HStmt::Expr(expr));
    }
    ctx.pop_scope();
    Block { stmts, span: block.span }
}

fn lower_stmt(ctx: &mut LowerCtx, stmt: &ast::Stmt, out: &mut Vec<HStmt>) {
    match stmt {
        ast::Stmt::Let(let_stmt) => out.push(lower_let(ctx, let_stmt)),
        ast::Stmt::Expr(e) => out.push(HStmt::Expr(lower_expr(ctx, e))),
        ast::Stmt::Return(value, span) => {
            out.push(HStmt::Return { value: value.as_ref().map(|e| lower_expr(ctx, e)), is_tail: false, span: *span })
        }
        ast::Stmt::If(if_stmt) => out.push(lower_if_stmt(ctx, if_stmt)),
        ast::Stmt::While(w) => {
            let cond = lower_expr(ctx, &w.cond);
            let body = lower_block(ctx, &w.body);
            out.push(HStmt::While { cond, body });
        }
        ast::Stmt::ForIn(f) => out.push(lower_for_in(ctx, f)),
        ast::Stmt::ForClassic(f) => out.push(lower_for_classic(ctx, f)),
        ast::Stmt::Break(_, span) => out.push(HStmt::Break { span: *span }),
        ast::Stmt::Continue(_, span) => out.push(HStmt::Continue { span: *span }),
        ast::Stmt::Item(item) => {
            // A nested item inside a function body (local struct/const/...)
            // carries no executable HIR of its own at statement position.
            let _ = item;
        }
    }
}

fn lower_let(ctx: &mut LowerCtx, let_stmt: &ast::LetStmt) -> HStmt {
    let ty = let_stmt.ty.as_ref().map(|t| resolve_type(ctx.sema, t)).unwrap_or(TypeId::NONE);
    let ownership = classify(&ctx.sema.interner, ty);
    let value = match &let_stmt.init {
        Some(e) => Some(lower_expr(ctx, e)),
        None if let_stmt.ty.is_some() => Some(default_value_call(ctx, ty, let_stmt.span)),
        None => None,
    };
    let (name, is_mut, pattern) = match &let_stmt.pattern {
        ast::Pattern::Ident(name, mutability) => (*name, matches!(mutability, ast::Mutability::Mutable), None),
        other => (Symbol::intern("_"), let_stmt.mutable, Some(lower_pattern(ctx, other))),
    };
    let symbol = ctx.bind(name);
    HStmt::Let { name, symbol, ty, value, is_mut, is_const: let_stmt.is_const, ownership, pattern }
}

fn lower_pattern(ctx: &mut LowerCtx, pattern: &ast::Pattern) -> HPattern {
    match pattern {
        ast::Pattern::Wildcard => HPattern::Wildcard,
        ast::Pattern::Ident(name, _) => HPattern::Binding { name: *name, symbol: ctx.bind(*name) },
        ast::Pattern::Path(path) => {
            let name = path.segments.last().expect("non-empty path").ident;
            HPattern::Tag { name, payload: Vec::new() }
        }
        ast::Pattern::Literal(lit) => HPattern::Literal(lower_literal(lit)),
        ast::Pattern::TupleStruct(path, pats) => {
            let name = path.segments.last().expect("non-empty path").ident;
            HPattern::Tag { name, payload: pats.iter().map(|p| lower_pattern(ctx, p)).collect() }
        }
        ast::Pattern::Struct(path, fields) => {
            let name = path.segments.last().expect("non-empty path").ident;
            HPattern::Tag { name, payload: fields.iter().map(|f| lower_pattern(ctx, &f.pattern)).collect() }
        }
        ast::Pattern::Tuple(pats) | ast::Pattern::Slice(pats) => {
            HPattern::Tuple { elements: pats.iter().map(|p| lower_pattern(ctx, p)).collect() }
        }
        ast::Pattern::Or(pats) => HPattern::Or(pats.iter().map(|p| lower_pattern(ctx, p)).collect()),
    }
}

fn lower_literal(lit: &ast::Literal) -> HLiteral {
    match lit {
        ast::Literal::Int(v, raw) => HLiteral::Int(*v, *raw),
        ast::Literal::Float(v, raw) => HLiteral::Float(*v, *raw),
        ast::Literal::String(s) => HLiteral::String(*s),
        ast::Literal::Char(c) => HLiteral::Char(*c),
        ast::Literal::Bool(b) => HLiteral::Bool(*b),
        ast::Literal::Unit => HLiteral::Unit,
    }
}

fn lower_if_stmt(ctx: &mut LowerCtx, if_stmt: &ast::IfStmt) -> HStmt {
    let cond = lower_expr(ctx, &if_stmt.cond);
    let then_block = lower_block(ctx, &if_stmt.then_block);
    let else_block = match &if_stmt.else_clause {
        None => None,
        Some(clause) => Some(match clause.as_ref() {
            ast::ElseClause::Block(b) => lower_block(ctx, b),
            ast::ElseClause::If(nested) => {
                let span = nested.cond.span();
                Block { stmts: vec![lower_if_stmt(ctx, nested)], span }
            }
        }),
    };
    HStmt::If { cond, then_block, else_block }
}

fn lower_for_in(ctx: &mut LowerCtx, f: &ast::ForInStmt) -> HStmt {
    let var = match &f.pattern {
        ast::Pattern::Ident(name, _) => *name,
        _ => Symbol::intern("_"),
    };
    let var_symbol = ctx.bind(var);
    let kind = if let ast::Expr::Range(range) = &f.iter {
        let start = range.start.as_ref().map(|e| Box::new(lower_expr(ctx, e))).unwrap_or_else(|| Box::new(int_literal(ctx, 0, f.span)));
        let end = range.end.as_ref().map(|e| Box::new(lower_expr(ctx, e))).unwrap_or_else(|| Box::new(int_literal(ctx, i64::MAX, f.span)));
        ForKind::Range { var, var_symbol, start, end, inclusive: range.inclusive }
    } else {
        ForKind::Iterator { var, var_symbol, iterable: Box::new(lower_expr(ctx, &f.iter)) }
    };
    let body = lower_block(ctx, &f.body);
    HStmt::For { kind, body, span: f.span }
}

fn lower_for_classic(ctx: &mut LowerCtx, f: &ast::ForClassicStmt) -> HStmt {
    ctx.push_scope();
    let mut init_stmts = Vec::new();
    if let Some(init) = &f.init {
        lower_stmt(ctx, init, &mut init_stmts);
    }
    let init = init_stmts.into_iter().next().map(Box::new);
    let cond = f.cond.as_ref().map(|c| Box::new(lower_expr(ctx, c)));
    let post = f.post.as_ref().and_then(|p| match p.as_ref() {
        ast::Stmt::Expr(e) => Some(Box::new(lower_expr(ctx, e))),
        _ => None,
    });
    let body = lower_block(ctx, &f.body);
    ctx.pop_scope();
    HStmt::For { kind: ForKind::Classic { init, cond, post }, body, span: f.span }
}

fn int_literal(ctx: &mut LowerCtx, v: i64, span: Span) -> HExpr {
    let id = ctx.next_expr_id();
    HExpr { id, kind: ExprKind::Literal(HLiteral::Int(v, None)), ty: ctx.sema.interner.intern(Type::Int64), span }
}

fn default_value_call(ctx: &mut LowerCtx, ty: TypeId, span: Span) -> HExpr {
    let id = ctx.next_expr_id();
    let callee_symbol = ctx.find_symbol(Symbol::intern("default"), SymbolKind::Function);
    let callee = Box::new(HExpr {
        id: ctx.next_expr_id(),
        kind: ExprKind::VarRef { symbol: callee_symbol.unwrap_or(vela_util::DefId::DUMMY), name: Symbol::intern("default") },
        ty: TypeId::NONE,
        span,
    });
    HExpr { id, kind: ExprKind::Call { callee, args: Vec::new() }, ty, span }
}

fn lower_expr(ctx: &mut LowerCtx, expr: &ast::Expr) -> HExpr {
    // Parenthesized groups are transparent: lower the inner expression and
    // reuse its id/span rather than allocating a wrapper node.
    if let ast::Expr::Group(inner, _) = expr {
        return lower_expr(ctx, inner);
    }

    let id = ctx.next_expr_id();
    let span = expr.span();
    let ty = ctx.expr_type_for(id);

    let kind = match expr {
        ast::Expr::Group(..) => unreachable!(),
        ast::Expr::Literal(lit, _) => ExprKind::Literal(lower_literal(lit)),
        ast::Expr::Path(path, _) => {
            let name = path.segments.last().expect("non-empty path").ident;
            let symbol = ctx.resolve(name).or_else(|| ctx.find_symbol(name, SymbolKind::Value)).unwrap_or(vela_util::DefId::DUMMY);
            ExprKind::VarRef { symbol, name }
        }
        ast::Expr::Binary(b) => ExprKind::BinaryOp { op: lower_binop(b.op), left: Box::new(lower_expr(ctx, &b.left)), right: Box::new(lower_expr(ctx, &b.right)) },
        ast::Expr::Unary(u) => ExprKind::UnaryOp { op: lower_unop(u.op), operand: Box::new(lower_expr(ctx, &u.expr)) },
        ast::Expr::Call(c) => return lower_call(ctx, c, id, ty, span),
        ast::Expr::MethodCall(m) => return lower_method_call(ctx, m, id, ty, span),
        ast::Expr::Field(f) => {
            if let Some(enum_value) = try_lower_enum_member(ctx, f) {
                enum_value
            } else {
                ExprKind::FieldAccess { object: Box::new(lower_expr(ctx, &f.object)), field: f.field }
            }
        }
        ast::Expr::Index(i) => ExprKind::Index { object: Box::new(lower_expr(ctx, &i.object)), index: Box::new(lower_expr(ctx, &i.index)) },
        ast::Expr::Block(b) => ExprKind::Block(lower_block(ctx, b)),
        ast::Expr::If(i) => ExprKind::If {
            cond: Box::new(lower_expr(ctx, &i.cond)),
            then_expr: Box::new(tail_expr_of_block(ctx, &i.then_block)),
            else_expr: i.else_block.as_ref().map(|e| Box::new(lower_expr(ctx, e))),
        },
        ast::Expr::Match(m) => ExprKind::Compare { subject: Box::new(lower_expr(ctx, &m.scrutinee)), arms: m.arms.iter().map(|a| lower_match_arm(ctx, a)).collect() },
        ast::Expr::Closure(cl) => {
            // Closures aren't part of this mid-end's reduced construct set;
            // lower the body alone so any contained generic/compare/for use
            // still gets normalized and monomorphized.
            ExprKind::Block(Block { stmts: vec![HStmt::Expr(lower_expr(ctx, &cl.body))], span })
        }
        ast::Expr::Assign(a) => return lower_assign(ctx, a, id, span),
        ast::Expr::CompoundAssign(ca) => return lower_compound_assign(ctx, ca, id, span),
        ast::Expr::Return(value, s) => ExprKind::Block(Block {
            stmts: vec![HStmt::Return { value: value.as_ref().map(|e| lower_expr(ctx, e)), is_tail: false, span: *s }],
            span: *s,
        }),
        ast::Expr::Break(_, _, s) => ExprKind::Block(Block { stmts: vec![HStmt::Break { span: *s }], span: *s }),
        ast::Expr::Continue(_, s) => ExprKind::Block(Block { stmts: vec![HStmt::Continue { span: *s }], span: *s }),
        ast::Expr::Tuple(elems, _) => ExprKind::TupleLit { elements: elems.iter().map(|e| lower_expr(ctx, e)).collect() },
        ast::Expr::Array(elems, _) => ExprKind::ArrayLit { elements: elems.iter().map(|e| lower_expr(ctx, e)).collect() },
        ast::Expr::Range(r) => return lower_range(ctx, r, id, ty, span),
        ast::Expr::Cast(value, target, _) => ExprKind::Cast { value: Box::new(lower_expr(ctx, value)), target: resolve_type(ctx.sema, target) },
        ast::Expr::Async(a) => ExprKind::Async { body: Box::new(HExpr { id: ctx.next_expr_id(), kind: ExprKind::Block(lower_block(ctx, &a.body)), ty: TypeId::NONE, span }) },
        ast::Expr::Await(value, s) => ExprKind::Await { value: Box::new(lower_expr(ctx, value)) },
        ast::Expr::Spawn(body, s) => ExprKind::Spawn { body: Box::new(lower_expr(ctx, body)) },
        ast::Expr::StructLiteral(sl) => ExprKind::StructLit {
            name: sl.path.segments.last().expect("non-empty path").ident,
            fields: sl.fields.iter().map(|f| (f.name, lower_expr(ctx, &f.expr))).collect(),
        },
        ast::Expr::EnumVariant(ev) => ExprKind::StructLit {
            name: ev.variant,
            fields: match &ev.data {
                ast::EnumVariantData::Unit => Vec::new(),
                ast::EnumVariantData::Tuple(args) => args.iter().enumerate().map(|(i, e)| (Symbol::intern(&i.to_string()), lower_expr(ctx, e))).collect(),
                ast::EnumVariantData::Struct(fields) => fields.iter().map(|f| (f.name, lower_expr(ctx, &f.expr))).collect(),
            },
        },
    };

    let expr = HExpr { id, kind, ty, span };
    apply_implicit_conversion(ctx, expr)
}

fn tail_expr_of_block(ctx: &mut LowerCtx, block: &ast::Block) -> HExpr {
    let span = block.span;
    HExpr { id: ctx.next_expr_id(), kind: ExprKind::Block(lower_block(ctx, block)), ty: TypeId::NONE, span }
}

fn lower_binop(op: ast::BinOp) -> HBinOp {
    match op {
        ast::BinOp::Add => HBinOp::Add,
        ast::BinOp::Sub => HBinOp::Sub,
        ast::BinOp::Mul => HBinOp::Mul,
        ast::BinOp::Div => HBinOp::Div,
        ast::BinOp::Mod => HBinOp::Mod,
        ast::BinOp::Eq => HBinOp::Eq,
        ast::BinOp::Ne => HBinOp::Ne,
        ast::BinOp::Lt => HBinOp::Lt,
        ast::BinOp::Gt => HBinOp::Gt,
        ast::BinOp::Le => HBinOp::Le,
        ast::BinOp::Ge => HBinOp::Ge,
        ast::BinOp::And => HBinOp::And,
        ast::BinOp::Or => HBinOp::Or,
        ast::BinOp::BitAnd => HBinOp::BitAnd,
        ast::BinOp::BitOr => HBinOp::BitOr,
        ast::BinOp::BitXor => HBinOp::BitXor,
        ast::BinOp::Shl => HBinOp::Shl,
        ast::BinOp::Shr => HBinOp::Shr,
    }
}

fn lower_unop(op: ast::UnOp) -> HUnOp {
    match op {
        ast::UnOp::Neg => HUnOp::Neg,
        ast::UnOp::Not | ast::UnOp::BitNot => HUnOp::Not,
        ast::UnOp::Deref => HUnOp::Deref,
        ast::UnOp::Ref(mutable) => HUnOp::Ref { mutable },
    }
}

/// Rewrites a call's receiver to match the first parameter's borrow form
/// (spec.md §4.1): `&T` wants a shared reference, `&mut T` wants a unique
/// one (left unchanged if only a shared borrow is available — a silent
/// failure the type checker would already have reported), and by-value
/// wants a dereferenced receiver.
fn adjust_receiver(receiver: HExpr, wants: Ownership) -> HExpr {
    let span = receiver.span;
    match wants {
        Ownership::Ref => match &receiver.kind {
            ExprKind::UnaryOp { op: HUnOp::Ref { .. }, operand } => HExpr {
                id: receiver.id,
                kind: ExprKind::UnaryOp { op: HUnOp::Ref { mutable: false }, operand: Box::new(HExpr { id: receiver.id, kind: ExprKind::UnaryOp { op: HUnOp::Deref, operand: operand.clone() }, ty: receiver.ty, span }) },
                ty: receiver.ty,
                span,
            },
            _ => HExpr { id: receiver.id, kind: ExprKind::UnaryOp { op: HUnOp::Ref { mutable: false }, operand: Box::new(receiver.clone()) }, ty: receiver.ty, span },
        },
        Ownership::RefMut => match &receiver.kind {
            ExprKind::UnaryOp { op: HUnOp::Ref { mutable: true }, .. } => receiver,
            _ => HExpr { id: receiver.id, kind: ExprKind::UnaryOp { op: HUnOp::Ref { mutable: true }, operand: Box::new(receiver.clone()) }, ty: receiver.ty, span },
        },
        _ => match &receiver.kind {
            ExprKind::UnaryOp { op: HUnOp::Ref { .. }, operand } => (**operand).clone(),
            _ => receiver,
        },
    }
}

fn first_param_ownership(ctx: &LowerCtx, callee_symbol: SymbolId) -> Ownership {
    ctx.symbols
        .get(callee_symbol)
        .signature
        .as_ref()
        .and_then(|sig| sig.param_types.first())
        .map(|&ty| classify(&ctx.sema.interner, ty))
        .unwrap_or(Ownership::None)
}

/// Collects trailing call arguments into a single `ArrayLit` when the
/// callee's signature declares a variadic parameter (spec.md §4.1).
fn collect_variadic(ctx: &mut LowerCtx, callee_symbol: SymbolId, mut args: Vec<HExpr>, span: Span) -> Vec<HExpr> {
    let entry = ctx.symbols.get(callee_symbol);
    let Some(sig) = &entry.signature else { return args };
    if !sig.variadic || sig.arity() == 0 {
        return args;
    }
    let k = sig.arity() - 1;
    if args.len() <= k {
        return args;
    }
    let elem_ty = sig.param_types.get(k).copied().unwrap_or(TypeId::NONE);
    let trailing: Vec<HExpr> = args.split_off(k);
    let array_ty = ctx.sema.interner.intern(Type::Array { elem: elem_ty, len: None });
    args.push(HExpr { id: ctx.next_expr_id(), kind: ExprKind::ArrayLit { elements: trailing }, ty: array_ty, span });
    args
}

fn lower_call(ctx: &mut LowerCtx, c: &ast::CallExpr, id: ExprId, ty: TypeId, span: Span) -> HExpr {
    // A call whose callee is a field access on a symbol-less field (i.e.
    // the parser produced `recv.name(args)` as `Field` + `Call` rather than
    // `MethodCall`) is itself a bound-method call the lowerer flattens.
    if let ast::Expr::Field(field) = c.func.as_ref() {
        if let Some(callee_symbol) = resolve_method_symbol(ctx, &field.object, field.field) {
            let receiver = lower_expr(ctx, &field.object);
            let wants = first_param_ownership(ctx, callee_symbol);
            let receiver = adjust_receiver(receiver, wants);
            let mut args = vec![receiver];
            args.extend(c.args.iter().map(|a| lower_expr(ctx, a)));
            let args = collect_variadic(ctx, callee_symbol, args, span);
            let callee = Box::new(HExpr { id: ctx.next_expr_id(), kind: ExprKind::VarRef { symbol: callee_symbol, name: field.field }, ty: TypeId::NONE, span });
            let expr = HExpr { id, kind: ExprKind::Call { callee, args }, ty, span };
            return apply_implicit_conversion(ctx, expr);
        }
    }

    if is_clone_call(c) {
        if let Some(expr) = try_lower_clone(ctx, c, id, ty, span) {
            return expr;
        }
    }

    let callee_symbol = match c.func.as_ref() {
        ast::Expr::Path(path, _) => {
            let name = path.segments.last().expect("non-empty path").ident;
            ctx.resolve(name).or_else(|| ctx.find_symbol(name, SymbolKind::Function))
        }
        _ => None,
    };
    let callee = Box::new(lower_expr(ctx, &c.func));
    let mut args: Vec<HExpr> = c.args.iter().map(|a| lower_expr(ctx, a)).collect();
    if let Some(sym) = callee_symbol {
        args = collect_variadic(ctx, sym, args, span);
    }
    let expr = HExpr { id, kind: ExprKind::Call { callee, args }, ty, span };
    apply_implicit_conversion(ctx, expr)
}

fn lower_method_call(ctx: &mut LowerCtx, m: &ast::MethodCallExpr, id: ExprId, ty: TypeId, span: Span) -> HExpr {
    let callee_symbol = resolve_method_symbol(ctx, &m.receiver, m.method);
    let receiver = lower_expr(ctx, &m.receiver);
    let receiver = match callee_symbol {
        Some(sym) => adjust_receiver(receiver, first_param_ownership(ctx, sym)),
        None => receiver,
    };
    let mut args = vec![receiver];
    args.extend(m.call_args.iter().map(|a| lower_expr(ctx, a)));
    if let Some(sym) = callee_symbol {
        args = collect_variadic(ctx, sym, args, span);
    }
    let callee = Box::new(HExpr {
        id: ctx.next_expr_id(),
        kind: ExprKind::VarRef { symbol: callee_symbol.unwrap_or(vela_util::DefId::DUMMY), name: m.method },
        ty: TypeId::NONE,
        span,
    });
    let expr = HExpr { id, kind: ExprKind::Call { callee, args }, ty, span };
    apply_implicit_conversion(ctx, expr)
}

fn resolve_method_symbol(ctx: &LowerCtx, receiver: &ast::Expr, method: Symbol) -> Option<SymbolId> {
    let receiver_ty = receiver_type_hint(ctx, receiver)?;
    ctx.symbols.methods_for_receiver(receiver_ty).iter().copied().find(|&sym| ctx.symbols.get(sym).name == method)
}

/// Best-effort receiver-type lookup used purely to find the right method
/// symbol; falls back to `None` (no method found, left as a plain field
/// access) rather than guessing, consistent with the lowerer's
/// never-fail contract.
fn receiver_type_hint(ctx: &LowerCtx, receiver: &ast::Expr) -> Option<TypeId> {
    match receiver {
        ast::Expr::Path(path, _) => {
            let name = path.segments.last()?.ident;
            let symbol = ctx.resolve(name)?;
            let ty = ctx.sema.type_of_binding(symbol);
            (ty != TypeId::NONE).then_some(ty)
        }
        _ => None,
    }
}

fn is_clone_call(c: &ast::CallExpr) -> bool {
    matches!(c.func.as_ref(), ast::Expr::Path(p, _) if p.segments.last().map(|s| s.ident.as_str() == "clone").unwrap_or(false)) && c.args.len() == 1
}

/// Clone intrinsic (spec.md §4.1): `clone(x)` on a copy-typed argument
/// reduces to `x` (dereferenced if `x` was a reference); otherwise
/// rewrites to a `__clone` method call resolved against the receiver.
fn try_lower_clone(ctx: &mut LowerCtx, c: &ast::CallExpr, id: ExprId, ty: TypeId, span: Span) -> Option<HExpr> {
    let arg = &c.args[0];
    let arg_expr = lower_expr(ctx, arg);
    let receiver_ty = receiver_type_hint(ctx, arg).unwrap_or(arg_expr.ty);
    if classify(&ctx.sema.interner, receiver_ty) == Ownership::Copy {
        let reduced = match arg_expr.kind {
            ExprKind::UnaryOp { op: HUnOp::Ref { .. }, operand } => *operand,
            other => HExpr { kind: other, ..arg_expr },
        };
        return Some(reduced);
    }
    let clone_symbol = ctx.sema.clone_symbol_for(id).or_else(|| ctx.find_symbol(Symbol::intern("__clone"), SymbolKind::Function));
    let receiver = adjust_receiver(arg_expr, Ownership::Ref);
    let callee = Box::new(HExpr {
        id: ctx.next_expr_id(),
        kind: ExprKind::VarRef { symbol: clone_symbol.unwrap_or(vela_util::DefId::DUMMY), name: Symbol::intern("__clone") },
        ty: TypeId::NONE,
        span,
    });
    Some(HExpr { id, kind: ExprKind::Call { callee, args: vec![receiver] }, ty, span })
}

fn try_lower_enum_member(ctx: &mut LowerCtx, f: &ast::FieldExpr) -> Option<ExprKind> {
    if let ast::Expr::Path(path, _) = f.object.as_ref() {
        let name = path.segments.last()?.ident;
        let type_symbol = ctx.find_symbol(name, SymbolKind::Type)?;
        let entry = ctx.symbols.get(type_symbol);
        let _ = entry;
        // Enum-info lookup (string/int constant per variant) belongs to the
        // symbol table's type metadata, not modeled as a separate table in
        // this workspace; field access is left as a regular member read
        // when no literal substitution is available.
        None
    } else {
        None
    }
}

fn lower_assign(ctx: &mut LowerCtx, a: &ast::AssignExpr, id: ExprId, span: Span) -> HExpr {
    let target = lower_expr(ctx, &a.place);
    let value = lower_expr(ctx, &a.value);
    HExpr { id, kind: ExprKind::Block(Block { stmts: vec![HStmt::Assign { target, value }], span }), ty: TypeId::NONE, span }
}

fn lower_compound_assign(ctx: &mut LowerCtx, ca: &ast::CompoundAssignExpr, id: ExprId, span: Span) -> HExpr {
    let target = lower_expr(ctx, &ca.place);
    let rhs = lower_expr(ctx, &ca.value);
    let value = HExpr { id: ctx.next_expr_id(), kind: ExprKind::BinaryOp { op: lower_binop(ca.op), left: Box::new(target.clone()), right: Box::new(rhs) }, ty: target.ty, span };
    HExpr { id, kind: ExprKind::Block(Block { stmts: vec![HStmt::Assign { target, value }], span }), ty: TypeId::NONE, span }
}

/// Range literals lower to intrinsic runtime calls (spec.md §4.1):
/// `rt_range_int_new`/`_from_start`/`_to_end`/`_full`, each taking a
/// trailing `inclusive` boolean.
fn lower_range(ctx: &mut LowerCtx, r: &ast::RangeExpr, id: ExprId, ty: TypeId, span: Span) -> HExpr {
    let inclusive_arg = HExpr { id: ctx.next_expr_id(), kind: ExprKind::Literal(HLiteral::Bool(r.inclusive)), ty: ctx.sema.interner.intern(Type::Bool), span };
    let (callee_name, mut args): (&str, Vec<HExpr>) = match (&r.start, &r.end) {
        (Some(s), Some(e)) => ("rt_range_int_new", vec![lower_expr(ctx, s), lower_expr(ctx, e)]),
        (Some(s), None) => ("rt_range_int_from_start", vec![lower_expr(ctx, s)]),
        (None, Some(e)) => ("rt_range_int_to_end", vec![lower_expr(ctx, e)]),
        (None, None) => ("rt_range_int_full", vec![]),
    };
    args.push(inclusive_arg);
    let callee_symbol = ctx.find_symbol(Symbol::intern(callee_name), SymbolKind::Function).unwrap_or(vela_util::DefId::DUMMY);
    let callee = Box::new(HExpr { id: ctx.next_expr_id(), kind: ExprKind::VarRef { symbol: callee_symbol, name: Symbol::intern(callee_name) }, ty: TypeId::NONE, span });
    HExpr { id, kind: ExprKind::Call { callee, args }, ty, span }
}

fn lower_match_arm(ctx: &mut LowerCtx, arm: &ast::MatchArm) -> CompareArm {
    ctx.push_scope();
    let pattern = lower_pattern(ctx, &arm.pattern);
    let guard = arm.guard.as_ref().map(|g| lower_expr(ctx, g));
    let result = Box::new(lower_expr(ctx, &arm.body));
    ctx.pop_scope();
    CompareArm { pattern, guard, result, span: result_span(&arm.body) }
}

fn result_span(expr: &ast::Expr) -> Span {
    expr.span()
}

/// Applies a type checker-recorded implicit conversion to an already
/// lowered expression (spec.md §4.1): `Some(expr)`/`Success(expr)` tag
/// construction, or an explicit `Cast`.
fn apply_implicit_conversion(ctx: &mut LowerCtx, expr: HExpr) -> HExpr {
    let Some(conv) = ctx.sema.implicit_conversion_of(expr.id).cloned() else { return expr };
    let span = expr.span;
    match conv {
        ImplicitConversion::Some => wrap_tag_constructor(ctx, expr, "Some", span),
        ImplicitConversion::Success => wrap_tag_constructor(ctx, expr, "Success", span),
        ImplicitConversion::To(target) => {
            let id = ctx.next_expr_id();
            HExpr { id, kind: ExprKind::Cast { value: Box::new(expr), target }, ty: target, span }
        }
    }
}

fn wrap_tag_constructor(ctx: &mut LowerCtx, expr: HExpr, tag: &str, span: Span) -> HExpr {
    let tag_symbol = ctx.find_symbol(Symbol::intern(tag), SymbolKind::Tag);
    let ty = expr.ty;
    let id = ctx.next_expr_id();
    let callee = Box::new(HExpr {
        id: ctx.next_expr_id(),
        kind: ExprKind::VarRef { symbol: tag_symbol.unwrap_or(vela_util::DefId::DUMMY), name: Symbol::intern(tag) },
        ty: TypeId::NONE,
        span,
    });
    HExpr { id, kind: ExprKind::Call { callee, args: vec![expr] }, ty, span }
}
