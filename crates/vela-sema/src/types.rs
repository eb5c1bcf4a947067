//! Interned types: the structural type graph the HIR, Ownership classifier
//! and monomorphizer all operate on through opaque [`TypeId`] handles
//! rather than owned trees.
//!
//! [`TypeInterner`] canonicalizes every [`Type`] it's given — two
//! structurally equal types always resolve to the same id — which is what
//! lets the monomorphizer compare types by id instead of walking them.

use rustc_hash::FxHashMap;
use vela_util::{DefId, Idx, IndexVec, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl Idx for TypeId {
    fn from_usize(idx: usize) -> Self {
        TypeId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl TypeId {
    /// Sentinel for an expression the type checker never assigned a type
    /// to. The lowerer propagates this rather than inventing a type.
    pub const NONE: TypeId = TypeId(0);
}

/// A structural type description. Every variant that contains nested
/// types stores [`TypeId`]s, not `Box<Type>` — recursion happens through
/// the interner, which cannot cycle because interning builds a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Placeholder occupying [`TypeId::NONE`]; also used for recovery
    /// after an unresolved reference.
    Unknown,
    Unit,
    /// The declared-result type of a function with no return value.
    Nothing,
    Bool,
    Char,
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    Isize,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Usize,
    Float32,
    Float64,
    Pointer(TypeId),
    Reference { inner: TypeId, mutable: bool },
    Own(TypeId),
    Array { elem: TypeId, len: Option<usize> },
    Tuple(Vec<TypeId>),
    Fn { params: Vec<TypeId>, result: TypeId },
    Struct { name: Symbol, def: DefId, args: Vec<TypeId>, fields: Vec<(Symbol, TypeId)> },
    Union { name: Symbol, def: DefId, args: Vec<TypeId>, tags: Vec<(Symbol, Vec<TypeId>)> },
    Alias { name: Symbol, def: DefId, args: Vec<TypeId>, target: TypeId },
    /// An unbound generic parameter of `owner`, at `index` in its
    /// generic-parameter list. Resolved away by monomorphization.
    GenericParam { owner: DefId, index: u32, name: Symbol },
}

impl Type {
    pub fn is_copy(&self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::Char
                | Type::Int8
                | Type::Int16
                | Type::Int32
                | Type::Int64
                | Type::Isize
                | Type::UInt8
                | Type::UInt16
                | Type::UInt32
                | Type::UInt64
                | Type::Usize
                | Type::Float32
                | Type::Float64
                | Type::Pointer(_)
                | Type::Fn { .. }
        )
    }

    /// True if `self` is, or transitively contains, a [`Type::GenericParam`]
    /// — checked recursively through the interner so nested positions
    /// (inside a struct's type args, a tuple element, ...) are caught.
    pub fn contains_generic_param(&self, interner: &TypeInterner) -> bool {
        match self {
            Type::GenericParam { .. } => true,
            Type::Pointer(t) | Type::Own(t) => interner.get(*t).contains_generic_param(interner),
            Type::Reference { inner, .. } => interner.get(*inner).contains_generic_param(interner),
            Type::Array { elem, .. } => interner.get(*elem).contains_generic_param(interner),
            Type::Tuple(ts) => ts.iter().any(|t| interner.get(*t).contains_generic_param(interner)),
            Type::Fn { params, result } => {
                params.iter().any(|t| interner.get(*t).contains_generic_param(interner))
                    || interner.get(*result).contains_generic_param(interner)
            }
            Type::Struct { args, .. } | Type::Union { args, .. } | Type::Alias { args, .. } => {
                args.iter().any(|t| interner.get(*t).contains_generic_param(interner))
            }
            _ => false,
        }
    }
}

/// Canonicalizing store of [`Type`]s. Not `Sync`: per spec.md §5 the core
/// pipeline is single-threaded per module, so one interner is owned
/// exclusively by whichever pass currently needs to register new types
/// (only the monomorphizer registers new entries after construction).
pub struct TypeInterner {
    types: IndexVec<TypeId, Type>,
    canon: FxHashMap<Type, TypeId>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        let mut types = IndexVec::new();
        types.push(Type::Unknown);
        Self { types, canon: FxHashMap::default() }
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.canon.get(&ty) {
            return id;
        }
        let id = self.types.push(ty.clone());
        self.canon.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.types.get(id).expect("TypeId not present in this interner")
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Renders a type the way the instantiation-map and `MonoModule` dump
/// formats require (spec.md §6): builtin names, `&T`/`&mut T`/`own T`/`*T`,
/// `[T]`/`[T; N]`, `(T1, T2, …)`, `fn(T) -> T`, or `Name<T1, …>`.
pub fn format_type(interner: &TypeInterner, id: TypeId) -> String {
    match interner.get(id) {
        Type::Unknown => "?".to_string(),
        Type::Unit => "()".to_string(),
        Type::Nothing => "nothing".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Char => "char".to_string(),
        Type::String => "string".to_string(),
        Type::Int8 => "int8".to_string(),
        Type::Int16 => "int16".to_string(),
        Type::Int32 => "int32".to_string(),
        Type::Int64 => "int".to_string(),
        Type::Isize => "isize".to_string(),
        Type::UInt8 => "uint8".to_string(),
        Type::UInt16 => "uint16".to_string(),
        Type::UInt32 => "uint32".to_string(),
        Type::UInt64 => "uint64".to_string(),
        Type::Usize => "usize".to_string(),
        Type::Float32 => "float32".to_string(),
        Type::Float64 => "float".to_string(),
        Type::Pointer(inner) => format!("*{}", format_type(interner, *inner)),
        Type::Reference { inner, mutable: false } => format!("&{}", format_type(interner, *inner)),
        Type::Reference { inner, mutable: true } => format!("&mut {}", format_type(interner, *inner)),
        Type::Own(inner) => format!("own {}", format_type(interner, *inner)),
        Type::Array { elem, len: None } => format!("[{}]", format_type(interner, *elem)),
        Type::Array { elem, len: Some(n) } => format!("[{}; {}]", format_type(interner, *elem), n),
        Type::Tuple(elems) => {
            let parts: Vec<_> = elems.iter().map(|t| format_type(interner, *t)).collect();
            format!("({})", parts.join(", "))
        }
        Type::Fn { params, result } => {
            let parts: Vec<_> = params.iter().map(|t| format_type(interner, *t)).collect();
            format!("fn({}) -> {}", parts.join(", "), format_type(interner, *result))
        }
        Type::Struct { name, args, .. } | Type::Union { name, args, .. } | Type::Alias { name, args, .. } => {
            if args.is_empty() {
                name.as_str().to_string()
            } else {
                let parts: Vec<_> = args.iter().map(|t| format_type(interner, *t)).collect();
                format!("{}<{}>", name.as_str(), parts.join(", "))
            }
        }
        Type::GenericParam { name, .. } => name.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_type_twice_returns_same_id() {
        let mut interner = TypeInterner::new();
        let a = interner.intern(Type::Int64);
        let b = interner.intern(Type::Int64);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_types_get_distinct_ids() {
        let mut interner = TypeInterner::new();
        let a = interner.intern(Type::Int64);
        let b = interner.intern(Type::Bool);
        assert_ne!(a, b);
    }

    #[test]
    fn format_reference_and_array() {
        let mut interner = TypeInterner::new();
        let int_ty = interner.intern(Type::Int64);
        let reference = interner.intern(Type::Reference { inner: int_ty, mutable: true });
        assert_eq!(format_type(&interner, reference), "&mut int");

        let array = interner.intern(Type::Array { elem: int_ty, len: Some(4) });
        assert_eq!(format_type(&interner, array), "[int; 4]");
    }

    #[test]
    fn format_nominal_with_args() {
        let mut interner = TypeInterner::new();
        let int_ty = interner.intern(Type::Int64);
        let vec_ty = interner.intern(Type::Struct {
            name: Symbol::intern("Vec"),
            def: DefId(1),
            args: vec![int_ty],
            fields: vec![],
        });
        assert_eq!(format_type(&interner, vec_ty), "Vec<int>");
    }

    #[test]
    fn generic_param_detected_through_array_and_struct() {
        let mut interner = TypeInterner::new();
        let param = interner.intern(Type::GenericParam { owner: DefId(0), index: 0, name: Symbol::intern("T") });
        let array = interner.intern(Type::Array { elem: param, len: None });
        assert!(interner.get(array).contains_generic_param(&interner));

        let concrete = interner.intern(Type::Int64);
        let concrete_array = interner.intern(Type::Array { elem: concrete, len: None });
        assert!(!interner.get(concrete_array).contains_generic_param(&interner));
    }

    #[test]
    fn is_copy_matches_spec_ownership_classes() {
        assert!(Type::Int64.is_copy());
        assert!(Type::Bool.is_copy());
        assert!(!Type::String.is_copy());
    }
}
