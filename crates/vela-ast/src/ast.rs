//! vela-ast - AST Node Definitions
//!
//! This module contains the AST node definitions produced by the lexer,
//! parser and AST builder. Those passes are external collaborators of this
//! crate: vela-ast only carries the shapes they hand off to name resolution,
//! type checking and, eventually, HIR construction.

use vela_util::{Span, Symbol};

/// AST root - a source file contains a list of items
pub type Ast = Vec<Item>;

/// Top-level item in a source file
#[derive(Debug, Clone)]
pub enum Item {
    /// Function definition
    Fn(FnItem),

    /// Structure definition
    Struct(StructItem),

    /// Enumeration (tagged union) definition
    Enum(EnumItem),

    /// Trait definition
    Trait(TraitItem),

    /// Implementation block
    Impl(ImplItem),

    /// Module import
    Use(UseItem),

    /// Constant definition
    Const(ConstItem),

    /// Static variable definition
    Static(StaticItem),
}

/// Function item
#[derive(Debug, Clone)]
pub struct FnItem {
    pub name: Symbol,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    /// Index of a variadic parameter, if the last parameter collects
    /// trailing arguments into an array.
    pub variadic_at: Option<usize>,
    pub ret_type: Option<Type>,
    pub body: Block,
    pub visibility: Visibility,
    pub span: Span,
    pub async_kw: bool,
    pub where_clause: Option<WhereClause>,
    /// Free-form attribute markers (`entrypoint`, `intrinsic`, `failfast`,
    /// `overload`, `override`, ...) read by HIR lowering to set flag bits.
    pub attrs: Vec<Symbol>,
}

/// Generic parameter
#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: Symbol,
    pub bounds: Vec<Type>,
}

/// Where clause constraint
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub bounds: Vec<WhereBound>,
}

/// A single where bound (e.g., `T: Trait1 + Trait2`)
#[derive(Debug, Clone)]
pub struct WhereBound {
    pub ty: Type,
    pub traits: Vec<Path>,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub ty: Option<Type>,
    pub mutable: bool,
    /// Default value expression, if the parameter may be omitted at the call site.
    pub default: Option<Expr>,
}

impl Param {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Structure item
#[derive(Debug, Clone)]
pub struct StructItem {
    pub name: Symbol,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<Field>,
    pub visibility: Visibility,
    pub span: Span,
    pub where_clause: Option<WhereClause>,
}

/// Field definition
#[derive(Debug, Clone)]
pub struct Field {
    pub name: Symbol,
    pub ty: Type,
    pub visibility: Visibility,
}

/// Enum item. Variants with no payload (e.g. `nothing`) are the source
/// language's `compile-time tag`s used throughout pattern matching.
#[derive(Debug, Clone)]
pub struct EnumItem {
    pub name: Symbol,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<Variant>,
    pub visibility: Visibility,
    pub span: Span,
    pub where_clause: Option<WhereClause>,
}

/// Enum variant
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: Symbol,
    pub data: VariantData,
}

/// Variant data types
#[derive(Debug, Clone)]
pub enum VariantData {
    Unit,
    Tuple(Vec<Type>),
    Struct(Vec<Field>),
}

/// Trait item
#[derive(Debug, Clone)]
pub struct TraitItem {
    pub name: Symbol,
    pub generics: Vec<GenericParam>,
    pub items: Vec<TraitMember>,
    pub supertraits: Vec<Type>,
    pub visibility: Visibility,
}

/// Trait member
#[derive(Debug, Clone)]
pub enum TraitMember {
    Method(FnSig),
    Type(Symbol, Vec<Type>),
    Const(Symbol, Type, Option<Expr>),
}

/// Function signature (without body)
#[derive(Debug, Clone)]
pub struct FnSig {
    pub name: Symbol,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub ret_type: Option<Type>,
}

/// Implementation item
#[derive(Debug, Clone)]
pub struct ImplItem {
    pub generics: Vec<GenericParam>,
    pub trait_ref: Option<Type>,
    pub self_ty: Type,
    pub items: Vec<ImplMember>,
    pub where_clause: Option<WhereClause>,
}

/// Implementation member
#[derive(Debug, Clone)]
pub enum ImplMember {
    Method(FnItem),
    Type(Symbol, Type),
    Const(Symbol, Type, Expr),
}

/// Use/import item
#[derive(Debug, Clone)]
pub struct UseItem {
    pub path: Path,
    pub alias: Option<Symbol>,
    pub is_glob: bool,
}

/// Constant item
#[derive(Debug, Clone)]
pub struct ConstItem {
    pub name: Symbol,
    pub ty: Option<Type>,
    pub value: Option<Expr>,
    pub visibility: Visibility,
    pub span: Span,
}

/// Static item
#[derive(Debug, Clone)]
pub struct StaticItem {
    pub name: Symbol,
    pub ty: Type,
    pub value: Expr,
    pub mutable: bool,
    pub visibility: Visibility,
    pub span: Span,
}

/// Visibility modifier
#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Public,
    Private,
    Crate,
    Super,
    Restricted(Path),
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Expr(Expr),
    Return(Option<Expr>, Span),
    If(IfStmt),
    While(WhileStmt),
    /// Iterator-style loop: `for x in xs { ... }` (covers both numeric
    /// ranges and generic iterables; distinguished during HIR lowering by
    /// the type of `iter`).
    ForIn(ForInStmt),
    /// Classic C-style loop: `for (init; cond; post) { ... }`.
    ForClassic(ForClassicStmt),
    Break(Option<Symbol>, Span),
    Continue(Option<Symbol>, Span),
    Item(Item),
}

/// Let statement
#[derive(Debug, Clone)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub ty: Option<Type>,
    pub init: Option<Expr>,
    pub mutable: bool,
    pub is_const: bool,
    pub span: Span,
}

/// If statement
#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_clause: Option<Box<ElseClause>>,
}

/// Else clause
#[derive(Debug, Clone)]
pub enum ElseClause {
    Block(Block),
    If(IfStmt),
}

/// While loop
#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub label: Option<Symbol>,
}

/// `for <pattern> in <iter> { <body> }`
#[derive(Debug, Clone)]
pub struct ForInStmt {
    pub pattern: Pattern,
    pub iter: Expr,
    pub body: Block,
    pub label: Option<Symbol>,
    pub span: Span,
}

/// `for (<init>; <cond>; <post>) { <body> }`
#[derive(Debug, Clone)]
pub struct ForClassicStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
    pub span: Span,
}

/// Block expression
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub trailing: Option<Box<Expr>>,
    pub span: Span,
}

/// Expression
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal, Span),
    Path(Path, Span),
    /// A parenthesized expression; eliminated during HIR lowering.
    Group(Box<Expr>, Span),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    MethodCall(MethodCallExpr),
    Field(FieldExpr),
    Index(IndexExpr),
    Block(Block),
    If(IfExpr),
    /// Pattern-matching construct of the source language (`compare`).
    Match(MatchExpr),
    Closure(ClosureExpr),
    Assign(AssignExpr),
    CompoundAssign(CompoundAssignExpr),
    Return(Option<Box<Expr>>, Span),
    Break(Option<Box<Expr>>, Option<Symbol>, Span),
    Continue(Option<Symbol>, Span),
    Tuple(Vec<Expr>, Span),
    Array(Vec<Expr>, Span),
    Range(RangeExpr),
    Cast(Box<Expr>, Type, Span),
    Async(AsyncExpr),
    Await(Box<Expr>, Span),
    Spawn(Box<Expr>, Span),
    StructLiteral(Box<StructLiteralExpr>),
    EnumVariant(Box<EnumVariantExpr>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Path(_, s)
            | Expr::Group(_, s)
            | Expr::Return(_, s)
            | Expr::Break(_, _, s)
            | Expr::Continue(_, s)
            | Expr::Tuple(_, s)
            | Expr::Array(_, s)
            | Expr::Cast(_, _, s)
            | Expr::Await(_, s)
            | Expr::Spawn(_, s) => *s,
            Expr::Binary(b) => b.span,
            Expr::Unary(u) => u.span,
            Expr::Call(c) => c.span,
            Expr::Field(f) => f.span,
            Expr::Block(b) => b.span,
            Expr::Range(r) => r.span,
            Expr::MethodCall(_)
            | Expr::Index(_)
            | Expr::If(_)
            | Expr::Match(_)
            | Expr::Closure(_)
            | Expr::Assign(_)
            | Expr::CompoundAssign(_)
            | Expr::Async(_)
            | Expr::StructLiteral(_)
            | Expr::EnumVariant(_) => Span::DUMMY,
        }
    }
}

/// Literal expression
#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64, Option<Symbol>),
    Float(f64, Option<Symbol>),
    String(Symbol),
    Char(char),
    Bool(bool),
    Unit,
}

/// Path expression
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

/// Path segment
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub ident: Symbol,
    pub args: Option<Vec<Type>>,
}

/// Binary expression
#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: BinOp,
    pub right: Box<Expr>,
    pub span: Span,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Unary expression
#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnOp,
    pub expr: Box<Expr>,
    pub span: Span,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    Deref,
    /// `Ref(true)` is `&mut`, `Ref(false)` is `&`.
    Ref(bool),
}

/// Function call expression
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
    pub generics: Option<Vec<Type>>,
}

/// Method call expression (`recv.method(args)`)
#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    pub receiver: Box<Expr>,
    pub method: Symbol,
    pub generics: Option<Vec<Type>>,
    pub call_args: Vec<Expr>,
    pub span: Span,
}

/// Field access expression
#[derive(Debug, Clone)]
pub struct FieldExpr {
    pub object: Box<Expr>,
    pub field: Symbol,
    pub span: Span,
}

/// Index expression
#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
}

/// If expression
#[derive(Debug, Clone)]
pub struct IfExpr {
    pub cond: Box<Expr>,
    pub then_block: Block,
    pub else_block: Option<Box<Expr>>,
}

/// `compare` expression: the source language's pattern-matching construct.
#[derive(Debug, Clone)]
pub struct MatchExpr {
    pub scrutinee: Box<Expr>,
    pub arms: Vec<MatchArm>,
}

/// One arm of a `compare` expression
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
}

/// Closure expression
#[derive(Debug, Clone)]
pub struct ClosureExpr {
    pub params: Vec<Param>,
    pub ret_type: Option<Type>,
    pub body: Box<Expr>,
    pub move_kw: bool,
}

/// Async expression
#[derive(Debug, Clone)]
pub struct AsyncExpr {
    pub body: Block,
    pub move_kw: bool,
}

/// Assignment expression
#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub place: Box<Expr>,
    pub value: Box<Expr>,
}

/// Compound assignment expression (`+=`, `-=`, ...)
#[derive(Debug, Clone)]
pub struct CompoundAssignExpr {
    pub place: Box<Expr>,
    pub op: BinOp,
    pub value: Box<Expr>,
}

/// Range expression: `a..b`, `a..=b`, `..b`, `a..`, `..`
#[derive(Debug, Clone)]
pub struct RangeExpr {
    pub start: Option<Box<Expr>>,
    pub end: Option<Box<Expr>>,
    pub inclusive: bool,
    pub span: Span,
}

/// Struct literal expression
#[derive(Debug, Clone)]
pub struct StructLiteralExpr {
    pub path: Path,
    pub generics: Option<Vec<Type>>,
    pub fields: Vec<StructField>,
    pub base: Option<Expr>,
}

/// Field in a struct literal
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: Symbol,
    pub expr: Expr,
    pub is_shorthand: bool,
}

/// Enum variant construction expression (e.g. `Some(x)`)
#[derive(Debug, Clone)]
pub struct EnumVariantExpr {
    pub path: Path,
    pub variant: Symbol,
    pub generics: Option<Vec<Type>>,
    pub data: EnumVariantData,
}

/// Enum variant data types
#[derive(Debug, Clone)]
pub enum EnumVariantData {
    Unit,
    Tuple(Vec<Expr>),
    Struct(Vec<StructField>),
}

/// Pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    /// A `nothing`/unit-tag pattern or binding to a named path (disambiguated
    /// against the symbol table during lowering).
    Path(Path),
    Ident(Symbol, Mutability),
    Literal(Literal),
    /// `Tag(p1, .., pn)` payload pattern
    TupleStruct(Path, Vec<Pattern>),
    Struct(Path, Vec<FieldPattern>),
    Tuple(Vec<Pattern>),
    Slice(Vec<Pattern>),
    Or(Vec<Pattern>),
}

/// Field in struct pattern
#[derive(Debug, Clone)]
pub struct FieldPattern {
    pub field: Symbol,
    pub pattern: Pattern,
}

/// Type expression
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Unit,
    Never,
    Inferred,
    Path(Path),
    Generic(Box<Type>, Vec<Type>),
    Reference(Box<Type>, Mutability),
    Pointer(Box<Type>, Mutability),
    Own(Box<Type>),
    Slice(Box<Type>),
    Array(Box<Type>, usize),
    Tuple(Vec<Type>),
    Fn(Vec<Type>, Box<Type>),
    TraitObject(Vec<Type>),
    ImplTrait(Vec<Type>),
}

/// Mutability
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutability {
    Mutable,
    Immutable,
}
