//! The DJ type-code domain (spec §3).
//!
//! DJ represents types as integers: the k-th user class for `k >= 1`,
//! `Object` for `0`, and five negative sentinels for the primitives and the
//! two synthetic types (`null`'s type, and `Object`'s nonexistent
//! superclass). Keeping this as a thin newtype rather than a Rust enum
//! matches how the symbol table, typed IR, and code generator all pass
//! class indices and type codes through the same integer space (a
//! `DOT_ID_EXPR`'s declaring class and an expression's static type are both
//! `TypeId`s).

/// Illegal/unresolved type. Never appears in a fully typechecked program.
pub const BAD_TYPE: i32 = -5;
/// The type of `Object`'s nonexistent superclass.
pub const NO_OBJECT: i32 = -4;
/// The type of the literal `null`.
pub const ANY_OBJECT: i32 = -3;
pub const BOOL: i32 = -2;
pub const NAT: i32 = -1;
/// The type of every user-declared class' implicit or explicit superclass root.
pub const OBJECT: i32 = 0;

/// A DJ type code: a primitive, a class index, or one of the two synthetic
/// sentinels (`ANY_OBJECT`, `NO_OBJECT`), or `BAD_TYPE` for an unresolved type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(i32);

impl TypeId {
    pub const BAD: TypeId = TypeId(BAD_TYPE);
    pub const NO_OBJECT: TypeId = TypeId(NO_OBJECT);
    pub const ANY_OBJECT: TypeId = TypeId(ANY_OBJECT);
    pub const BOOL: TypeId = TypeId(BOOL);
    pub const NAT: TypeId = TypeId(NAT);
    pub const OBJECT: TypeId = TypeId(OBJECT);

    /// The type of the k-th user-declared class (`k >= 1` in source-declaration
    /// order; class 0 is reserved for `Object` and is reached via `TypeId::OBJECT`).
    #[inline]
    pub fn class(index: u32) -> TypeId {
        TypeId(index as i32)
    }

    /// Raw integer encoding, for FFI with the generated IR and for diagnostics.
    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Class-table index, if this type names a declared class (including `Object`).
    #[inline]
    pub fn class_index(self) -> Option<u32> {
        (self.0 >= OBJECT).then_some(self.0 as u32)
    }

    #[inline]
    pub fn is_nat(self) -> bool {
        self == TypeId::NAT
    }

    #[inline]
    pub fn is_bool(self) -> bool {
        self == TypeId::BOOL
    }

    #[inline]
    pub fn is_primitive(self) -> bool {
        self.is_nat() || self.is_bool()
    }

    /// A reference type is a declared class or `ANY_OBJECT` (the type of `null`).
    #[inline]
    pub fn is_reference(self) -> bool {
        self.class_index().is_some() || self == TypeId::ANY_OBJECT
    }

    #[inline]
    pub fn is_bad(self) -> bool {
        self == TypeId::BAD
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            BAD_TYPE => write!(f, "<illegal type>"),
            NO_OBJECT => write!(f, "<no-object>"),
            ANY_OBJECT => write!(f, "<any-object>"),
            BOOL => write!(f, "bool"),
            NAT => write!(f, "nat"),
            OBJECT => write!(f, "Object"),
            k => write!(f, "<class {k}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_predicate() {
        assert!(TypeId::ANY_OBJECT.is_reference());
        assert!(TypeId::OBJECT.is_reference());
        assert!(TypeId::class(3).is_reference());
        assert!(!TypeId::NAT.is_reference());
        assert!(!TypeId::BOOL.is_reference());
    }

    #[test]
    fn class_index_excludes_primitives_and_sentinels() {
        assert_eq!(TypeId::OBJECT.class_index(), Some(0));
        assert_eq!(TypeId::class(5).class_index(), Some(5));
        assert_eq!(TypeId::NAT.class_index(), None);
        assert_eq!(TypeId::ANY_OBJECT.class_index(), None);
    }
}
