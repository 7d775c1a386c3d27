// The closed set of value types in the language, and the parameter-position
// type sets built-ins like `ecrire` accept.

use enumflags2::BitFlags;
use std::fmt;

/// A single storable kind. `Type::Void` has no corresponding `Kind` — it can
/// never appear in a parameter's accepted-type set.
#[derive(enumflags2::BitFlags, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Integer = 0b01,
    Boolean = 0b10,
}

/// The set of kinds a parameter position accepts. For most parameters this
/// is a single kind; `ecrire`'s argument accepts `Integer | Boolean`.
pub type KindSet = BitFlags<Kind>;

/// The type of a variable, expression result, or function return value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Boolean,
    Void,
}

impl Type {
    /// Byte size of a value of this type. `Void` is not storable and has no
    /// size; callers must never ask for the size of a `Void`-typed slot.
    pub fn size(self) -> i32 {
        match self {
            Type::Integer => 4,
            Type::Boolean => 4,
            Type::Void => panic!("Type::Void has no storage size"),
        }
    }

    /// The `Kind` this type occupies in a parameter's accepted-type set, or
    /// `None` for `Void` (which can never satisfy a parameter).
    pub fn kind(self) -> Option<Kind> {
        match self {
            Type::Integer => Some(Kind::Integer),
            Type::Boolean => Some(Kind::Boolean),
            Type::Void => None,
        }
    }

    /// Whether a value of this type may be passed where `accepted` is the
    /// parameter's declared type set (member-of-set check, spec.md §4.1).
    pub fn satisfies(self, accepted: KindSet) -> bool {
        match self.kind() {
            Some(kind) => accepted.contains(kind),
            None => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "entier"),
            Type::Boolean => write!(f, "booleen"),
            Type::Void => write!(f, "void"),
        }
    }
}

/// Build the accepted-type set for a parameter declared with a single
/// surface-syntax type name (`entier` or `booleen`). Built-ins with a wider
/// accepted set (`ecrire`) construct their `KindSet` directly.
pub fn single(ty: Type) -> KindSet {
    match ty.kind() {
        Some(kind) => BitFlags::from_flag(kind),
        None => BitFlags::empty(),
    }
}
