//! Type substitution (spec.md §4.5 step 5): a memoized recursive rewrite
//! over the interned type graph, swapping every `GenericParam` bound to a
//! known owner for its concrete argument. Grounded the same way the
//! teacher's unifier resolves inference variables through the interner
//! (`faxc-sem/src/infer.rs`'s `resolve`) — structural recursion driven
//! entirely by `TypeInterner::get`, never by walking a separate AST.

use rustc_hash::FxHashMap;
use vela_sema::{Type, TypeId, TypeInterner};
use vela_util::{DefId, Symbol};

/// Maps generic parameters of one or more "owners" to concrete type
/// arguments. A method instantiation registers two owners: the method's
/// own symbol (for any generic parameters the method itself declares) and
/// its receiver's nominal type symbol (for parameters declared on the
/// struct/union the method is defined against) — spec.md §4.5 step 4.
#[derive(Debug, Default, Clone)]
pub struct Substitution {
    args_by_owner: FxHashMap<DefId, Vec<TypeId>>,
    by_name: FxHashMap<(DefId, Symbol), TypeId>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner`'s generic parameter list alongside the concrete
    /// `args` it should resolve to, both positionally (by index) and by
    /// name (the by-name fallback spec.md §4.5 step 4 calls for).
    pub fn add_owner(&mut self, owner: DefId, args: Vec<TypeId>, generic_names: &[Symbol]) {
        for (i, &name) in generic_names.iter().enumerate() {
            if let Some(&arg) = args.get(i) {
                self.by_name.insert((owner, name), arg);
            }
        }
        self.args_by_owner.insert(owner, args);
    }

    pub fn is_empty(&self) -> bool {
        self.args_by_owner.is_empty()
    }

    fn resolve(&self, owner: DefId, index: u32, name: Symbol) -> Option<TypeId> {
        if let Some(args) = self.args_by_owner.get(&owner) {
            if let Some(&arg) = args.get(index as usize) {
                return Some(arg);
            }
        }
        self.by_name.get(&(owner, name)).copied()
    }
}

/// Applies `subst` to `ty`, re-interning any constructor whose contents
/// changed. Returns `ty` unchanged (same id) when nothing under it needed
/// rewriting — the "if identical to original, return" rule spec.md §4.5
/// step 5 states for nominal types, generalized to every constructor so
/// callers can cheaply tell whether a rewrite actually happened.
pub fn substitute(
    interner: &mut TypeInterner,
    subst: &Substitution,
    cache: &mut FxHashMap<TypeId, TypeId>,
    ty: TypeId,
) -> TypeId {
    if subst.is_empty() {
        return ty;
    }
    if let Some(&cached) = cache.get(&ty) {
        return cached;
    }
    // Break self-referential recursion (a struct field referring back to
    // its own type) by seeding the cache with the identity before
    // recursing into children.
    cache.insert(ty, ty);

    let owned = interner.get(ty).clone();
    let result = match owned {
        Type::GenericParam { owner, index, name } => subst.resolve(owner, index, name).unwrap_or(ty),
        Type::Pointer(inner) => rewrap1(interner, subst, cache, ty, inner, Type::Pointer),
        Type::Reference { inner, mutable } => {
            let new_inner = substitute(interner, subst, cache, inner);
            if new_inner == inner {
                ty
            } else {
                interner.intern(Type::Reference { inner: new_inner, mutable })
            }
        }
        Type::Own(inner) => rewrap1(interner, subst, cache, ty, inner, Type::Own),
        Type::Array { elem, len } => {
            let new_elem = substitute(interner, subst, cache, elem);
            if new_elem == elem {
                ty
            } else {
                interner.intern(Type::Array { elem: new_elem, len })
            }
        }
        Type::Tuple(elems) => {
            let new_elems: Vec<TypeId> = elems.iter().map(|&e| substitute(interner, subst, cache, e)).collect();
            if new_elems == elems {
                ty
            } else {
                interner.intern(Type::Tuple(new_elems))
            }
        }
        Type::Fn { params, result } => {
            let new_params: Vec<TypeId> = params.iter().map(|&p| substitute(interner, subst, cache, p)).collect();
            let new_result = substitute(interner, subst, cache, result);
            if new_params == params && new_result == result {
                ty
            } else {
                interner.intern(Type::Fn { params: new_params, result: new_result })
            }
        }
        Type::Struct { name, def, args, fields } => {
            if args.is_empty() {
                ty
            } else {
                let new_args: Vec<TypeId> = args.iter().map(|&a| substitute(interner, subst, cache, a)).collect();
                if new_args == args {
                    ty
                } else {
                    let new_fields =
                        fields.iter().map(|(fname, fty)| (*fname, substitute(interner, subst, cache, *fty))).collect();
                    interner.intern(Type::Struct { name, def, args: new_args, fields: new_fields })
                }
            }
        }
        Type::Union { name, def, args, tags } => {
            if args.is_empty() {
                ty
            } else {
                let new_args: Vec<TypeId> = args.iter().map(|&a| substitute(interner, subst, cache, a)).collect();
                if new_args == args {
                    ty
                } else {
                    let new_tags = tags
                        .iter()
                        .map(|(tname, payload)| {
                            (*tname, payload.iter().map(|&p| substitute(interner, subst, cache, p)).collect())
                        })
                        .collect();
                    interner.intern(Type::Union { name, def, args: new_args, tags: new_tags })
                }
            }
        }
        Type::Alias { name, def, args, target } => {
            let new_target = substitute(interner, subst, cache, target);
            if args.is_empty() {
                new_target
            } else {
                let new_args: Vec<TypeId> = args.iter().map(|&a| substitute(interner, subst, cache, a)).collect();
                if new_args == args && new_target == target {
                    ty
                } else {
                    interner.intern(Type::Alias { name, def, args: new_args, target: new_target })
                }
            }
        }
        Type::Unknown
        | Type::Unit
        | Type::Nothing
        | Type::Bool
        | Type::Char
        | Type::String
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
        | Type::Float64 => ty,
    };

    cache.insert(ty, result);
    result
}

fn rewrap1(
    interner: &mut TypeInterner,
    subst: &Substitution,
    cache: &mut FxHashMap<TypeId, TypeId>,
    ty: TypeId,
    inner: TypeId,
    ctor: impl FnOnce(TypeId) -> Type,
) -> TypeId {
    let new_inner = substitute(interner, subst, cache, inner);
    if new_inner == inner {
        ty
    } else {
        interner.intern(ctor(new_inner))
    }
}
