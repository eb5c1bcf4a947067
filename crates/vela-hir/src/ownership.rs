//! Ownership classifier (spec.md §4.6): a pure `TypeId -> Ownership`
//! mapping used whenever a `Let` or `Param` is (re)built during lowering
//! or re-substituted during monomorphization.

use crate::hir::Ownership;
use vela_sema::{Type, TypeId, TypeInterner};

/// Classifies `ty`'s ownership qualifier. Never mutates the interner —
/// callers are expected to have already interned every type they ask
/// about.
pub fn classify(interner: &TypeInterner, ty: TypeId) -> Ownership {
    match interner.get(ty) {
        Type::Reference { mutable: false, .. } => Ownership::Ref,
        Type::Reference { mutable: true, .. } => Ownership::RefMut,
        Type::Pointer(_) => Ownership::Ptr,
        Type::Own(_) => Ownership::Own,
        Type::Int8
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
        | Type::Bool => Ownership::Copy,
        _ => Ownership::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_classify_by_mutability() {
        let mut interner = TypeInterner::new();
        let int_ty = interner.intern(Type::Int64);
        let shared = interner.intern(Type::Reference { inner: int_ty, mutable: false });
        let unique = interner.intern(Type::Reference { inner: int_ty, mutable: true });
        assert_eq!(classify(&interner, shared), Ownership::Ref);
        assert_eq!(classify(&interner, unique), Ownership::RefMut);
    }

    #[test]
    fn primitives_classify_as_copy() {
        let mut interner = TypeInterner::new();
        let int_ty = interner.intern(Type::Int64);
        let bool_ty = interner.intern(Type::Bool);
        assert_eq!(classify(&interner, int_ty), Ownership::Copy);
        assert_eq!(classify(&interner, bool_ty), Ownership::Copy);
    }

    #[test]
    fn pointer_and_own_classify_distinctly_from_reference() {
        let mut interner = TypeInterner::new();
        let int_ty = interner.intern(Type::Int64);
        let ptr = interner.intern(Type::Pointer(int_ty));
        let owned = interner.intern(Type::Own(int_ty));
        assert_eq!(classify(&interner, ptr), Ownership::Ptr);
        assert_eq!(classify(&interner, owned), Ownership::Own);
    }

    #[test]
    fn struct_and_string_classify_as_none() {
        let mut interner = TypeInterner::new();
        let string_ty = interner.intern(Type::String);
        assert_eq!(classify(&interner, string_ty), Ownership::None);
    }
}
