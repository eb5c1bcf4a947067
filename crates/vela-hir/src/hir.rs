//! HIR data model (spec.md §3): a typed tree one level more structured
//! than the AST, carrying resolved symbol ids, interned types, and
//! ownership qualifiers on every binding.

use bitflags::bitflags;
use vela_sema::{ExprId, LocalId, SymbolId, TypeId};
use vela_util::{Idx, IndexVec, Span, Symbol};

/// Per-module function identifier. Values are 1-based per spec.md §3
/// ("`FuncID` values within a module are unique and monotonically
/// assigned from 1"); `Idx::index` maps back to the underlying 0-based
/// arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl Idx for FuncId {
    fn from_usize(idx: usize) -> Self {
        FuncId(idx as u32 + 1)
    }
    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FuncFlags: u16 {
        const ASYNC      = 1 << 0;
        const FAILFAST   = 1 << 1;
        const INTRINSIC  = 1 << 2;
        const ENTRYPOINT = 1 << 3;
        const PUBLIC     = 1 << 4;
        const OVERLOAD   = 1 << 5;
        const OVERRIDE   = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Own,
    Ref,
    RefMut,
    Ptr,
    Copy,
    None,
}

#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: Symbol,
    pub bounds: Vec<TypeId>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub symbol: SymbolId,
    pub ty: TypeId,
    pub ownership: Ownership,
    pub default: Option<Expr>,
    pub has_default: bool,
}

/// A function as it exists before monomorphization: possibly generic,
/// with a body still containing the full HIR construct set.
#[derive(Debug, Clone)]
pub struct Func {
    pub id: FuncId,
    pub name: Symbol,
    pub symbol: SymbolId,
    pub span: Span,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub result: TypeId,
    pub flags: FuncFlags,
    pub body: Block,
    pub borrow_graph: Option<crate::borrow::BorrowGraph>,
    pub move_plan: Option<crate::borrow::MovePlan>,
}

impl Func {
    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForKind {
    /// Classic `for (init; cond; post)`. Erased by normalization.
    Classic { init: Option<Box<Stmt>>, cond: Option<Box<Expr>>, post: Option<Box<Expr>> },
    /// Numeric-range `for x in a..b` / `a..=b`. Erased by normalization.
    Range { var: Symbol, var_symbol: SymbolId, start: Box<Expr>, end: Box<Expr>, inclusive: bool },
    /// Generic iterator `for x in xs`. Erased by normalization.
    Iterator { var: Symbol, var_symbol: SymbolId, iterable: Box<Expr> },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: Symbol,
        symbol: SymbolId,
        ty: TypeId,
        value: Option<Expr>,
        is_mut: bool,
        is_const: bool,
        ownership: Ownership,
        pattern: Option<Pattern>,
    },
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    Return {
        value: Option<Expr>,
        is_tail: bool,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    /// Present only before normalization; `vela_hir::normalize` erases
    /// every `For` into `While` + explicit state (spec.md §4.2).
    For {
        kind: ForKind,
        body: Block,
        span: Span,
    },
    Block(Block),
    Drop {
        value: Expr,
    },
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    Binding { name: Symbol, symbol: SymbolId },
    Tag { name: Symbol, payload: Vec<Pattern> },
    Tuple { elements: Vec<Pattern> },
    Literal(Literal),
    Or(Vec<Pattern>),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64, Option<Symbol>),
    Float(f64, Option<Symbol>),
    String(Symbol),
    Bool(bool),
    Char(char),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, Mod,
    Eq, Ne, Lt, Gt, Le, Ge,
    And, Or,
    BitAnd, BitOr, BitXor, Shl, Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Deref,
    Ref { mutable: bool },
}

#[derive(Debug, Clone)]
pub struct CompareArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub result: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    VarRef { symbol: SymbolId, name: Symbol },
    UnaryOp { op: UnOp, operand: Box<Expr> },
    BinaryOp { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    FieldAccess { object: Box<Expr>, field: Symbol },
    Index { object: Box<Expr>, index: Box<Expr> },
    StructLit { name: Symbol, fields: Vec<(Symbol, Expr)> },
    ArrayLit { elements: Vec<Expr> },
    TupleLit { elements: Vec<Expr> },
    /// Pattern-matching construct. Erased by normalization into
    /// `If`/`TagTest`/`TagPayload` chains (spec.md §4.2).
    Compare { subject: Box<Expr>, arms: Vec<CompareArm> },
    /// Intrinsic introduced by normalization: true if `subject`'s runtime
    /// tag equals `tag_name`.
    TagTest { subject: Box<Expr>, tag_name: Symbol },
    /// Intrinsic introduced by normalization: extracts payload slot
    /// `index` of `subject`'s `tag_name` variant.
    TagPayload { subject: Box<Expr>, tag_name: Symbol, index: usize },
    /// Intrinsic introduced by normalization for generic-iterator `for`;
    /// carries `NoTypeID` until a later stage resolves it (spec.md §4.2).
    IterInit { iterable: Box<Expr> },
    IterNext { iterator: Box<Expr> },
    If { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Option<Box<Expr>> },
    Await { value: Box<Expr> },
    Spawn { body: Box<Expr> },
    Async { body: Box<Expr> },
    Cast { value: Box<Expr>, target: TypeId },
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub ty: TypeId,
    pub span: Span,
}

/// A module-level type, constant or global declaration. Monomorphization
/// only ever instantiates the nominal types referenced from function
/// bodies (spec.md §4.5 Phase 4/5); this is the source-level declaration
/// they're instantiated from.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Symbol,
    pub symbol: SymbolId,
    pub generics: Vec<GenericParam>,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: Symbol,
    pub symbol: SymbolId,
    pub ty: TypeId,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct GlobalDecl {
    pub name: Symbol,
    pub symbol: SymbolId,
    pub ty: TypeId,
    pub init: Option<Expr>,
}

/// One source file's worth of HIR: every function, type, constant and
/// global it declares. The `TypeInterner`/`SymbolResult`/`SemaResult` a
/// module was built from are passed alongside it to each pass rather than
/// borrowed inside it, so `Module` stays a plain owned value with no
/// lifetime parameter — `MonoModule` can then hold the original `Module`
/// by value as its `source` field (spec.md §5's provenance requirement)
/// without fighting the borrow checker.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: Symbol,
    pub path: String,
    pub file_id: vela_util::FileId,
    pub funcs: IndexVec<FuncId, Func>,
    pub types: Vec<TypeDecl>,
    pub constants: Vec<ConstDecl>,
    pub globals: Vec<GlobalDecl>,
}

impl Module {
    pub fn new(name: Symbol, path: impl Into<String>, file_id: vela_util::FileId) -> Self {
        Self {
            name,
            path: path.into(),
            file_id,
            funcs: IndexVec::new(),
            types: Vec::new(),
            constants: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn push_func(&mut self, f: Func) -> FuncId {
        self.funcs.push(f)
    }

    pub fn func(&self, id: FuncId) -> &Func {
        self.funcs.get(id).expect("FuncId not present in this Module")
    }
}

/// Recursively visits every `Expr` reachable from a statement, innermost
/// first — the shared traversal `normalize`, the borrow lifter, and the
/// post-mono validator all walk bodies this way.
pub fn visit_exprs_in_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Expr)) {
    match stmt {
        Stmt::Let { value, .. } => {
            if let Some(v) = value {
                visit_exprs(v, f);
            }
        }
        Stmt::Expr(e) => visit_exprs(e, f),
        Stmt::Assign { target, value } => {
            visit_exprs(target, f);
            visit_exprs(value, f);
        }
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                visit_exprs(v, f);
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
        Stmt::If { cond, then_block, else_block } => {
            visit_exprs(cond, f);
            visit_exprs_in_block(then_block, f);
            if let Some(b) = else_block {
                visit_exprs_in_block(b, f);
            }
        }
        Stmt::While { cond, body } => {
            visit_exprs(cond, f);
            visit_exprs_in_block(body, f);
        }
        Stmt::For { body, .. } => {
            visit_exprs_in_block(body, f);
        }
        Stmt::Block(block) => visit_exprs_in_block(block, f),
        Stmt::Drop { value } => visit_exprs(value, f),
    }
}

pub fn visit_exprs_in_block<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr)) {
    for stmt in &block.stmts {
        visit_exprs_in_stmt(stmt, f);
    }
}

pub fn visit_exprs<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef { .. } => {}
        ExprKind::UnaryOp { operand, .. } => visit_exprs(operand, f),
        ExprKind::BinaryOp { left, right, .. } => {
            visit_exprs(left, f);
            visit_exprs(right, f);
        }
        ExprKind::Call { callee, args } => {
            visit_exprs(callee, f);
            for a in args {
                visit_exprs(a, f);
            }
        }
        ExprKind::FieldAccess { object, .. } => visit_exprs(object, f),
        ExprKind::Index { object, index } => {
            visit_exprs(object, f);
            visit_exprs(index, f);
        }
        ExprKind::StructLit { fields, .. } => {
            for (_, v) in fields {
                visit_exprs(v, f);
            }
        }
        ExprKind::ArrayLit { elements } | ExprKind::TupleLit { elements } => {
            for e in elements {
                visit_exprs(e, f);
            }
        }
        ExprKind::Compare { subject, arms } => {
            visit_exprs(subject, f);
            for arm in arms {
                if let Some(guard) = &arm.guard {
                    visit_exprs(guard, f);
                }
                visit_exprs(&arm.result, f);
            }
        }
        ExprKind::TagTest { subject, .. } => visit_exprs(subject, f),
        ExprKind::TagPayload { subject, .. } => visit_exprs(subject, f),
        ExprKind::IterInit { iterable } => visit_exprs(iterable, f),
        ExprKind::IterNext { iterator } => visit_exprs(iterator, f),
        ExprKind::If { cond, then_expr, else_expr } => {
            visit_exprs(cond, f);
            visit_exprs(then_expr, f);
            if let Some(e) = else_expr {
                visit_exprs(e, f);
            }
        }
        ExprKind::Await { value } | ExprKind::Spawn { body: value } | ExprKind::Async { body: value } => {
            visit_exprs(value, f)
        }
        ExprKind::Cast { value, .. } => visit_exprs(value, f),
        ExprKind::Block(block) => visit_exprs_in_block(block, f),
    }
    f(expr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_id_is_one_based_but_index_is_zero_based() {
        let mut funcs: IndexVec<FuncId, &str> = IndexVec::new();
        let first = funcs.push("f1");
        let second = funcs.push("f2");
        assert_eq!(first, FuncId(1));
        assert_eq!(second, FuncId(2));
        assert_eq!(funcs[first], "f1");
    }

    #[test]
    fn func_flags_combine_with_bitwise_or() {
        let flags = FuncFlags::PUBLIC | FuncFlags::ENTRYPOINT;
        assert!(flags.contains(FuncFlags::PUBLIC));
        assert!(flags.contains(FuncFlags::ENTRYPOINT));
        assert!(!flags.contains(FuncFlags::ASYNC));
    }

    #[test]
    fn visit_exprs_walks_nested_binary_op() {
        let span = Span::DUMMY;
        let lit = |n: i64| Expr {
            id: ExprId(0),
            kind: ExprKind::Literal(Literal::Int(n, None)),
            ty: TypeId::NONE,
            span,
        };
        let expr = Expr {
            id: ExprId(1),
            kind: ExprKind::BinaryOp { op: BinOp::Add, left: Box::new(lit(1)), right: Box::new(lit(2)) },
            ty: TypeId::NONE,
            span,
        };
        let mut count = 0;
        visit_exprs(&expr, &mut |_| count += 1);
        assert_eq!(count, 3);
    }
}
