//! Capability keys for the dependency injection container.

use std::any::TypeId;

/// Key for capability storage and lookup.
///
/// A capability is either a concrete type or a trait object. Concrete keys
/// compare by `TypeId` only; the name is carried for diagnostics.
///
/// # Examples
///
/// ```rust
/// use ferrous_web::{key_of_trait, key_of_type, Key};
///
/// trait Clock: Send + Sync {}
///
/// let a = key_of_type::<u32>();
/// assert_eq!(a, Key::Type(std::any::TypeId::of::<u32>(), "whatever"));
/// assert_eq!(a.display_name(), "u32");
///
/// let t = key_of_trait::<dyn Clock>();
/// assert!(t.display_name().contains("Clock"));
/// assert!(t.is_trait());
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait object key, identified by the trait's type name
    Trait(&'static str),
}

impl Key {
    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
        }
    }

    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_))
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Hot path: TypeId comparison only
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}
