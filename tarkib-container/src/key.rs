//! Type identification keys.
//!
//! [`TypeKey`] identifies an abstraction or a concrete type inside the
//! resolver. Names for named bindings live next to the key in the mapping
//! tables, so one key can own several named entries.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use tarkib_support::rendering::{generic_definition, shorten_type_name};

/// Identifies a type in the resolver.
///
/// Combines a [`TypeId`] with the human-readable type name used in logs
/// and error messages. Works for unsized types, so trait objects can be
/// used as abstractions.
///
/// # Examples
/// ```
/// use tarkib_container::key::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.short_name(), "String");
///
/// trait Logger {}
/// let abstraction = TypeKey::of::<dyn Logger>();
/// assert_ne!(abstraction, key);
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of this type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name with module paths stripped.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// Returns the generic definition this type was instantiated from.
    ///
    /// `app::Repo<app::User>` and `app::Repo<app::Order>` share the
    /// definition `app::Repo`. Non-generic types are their own definition.
    pub fn definition(&self) -> &'static str {
        generic_definition(self.type_name)
    }

    /// Returns `true` if this type carries generic arguments.
    pub fn is_generic(&self) -> bool {
        self.type_name.len() != self.definition().len()
    }

    /// Returns `true` if this key identifies `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Normalizes a binding name: an empty name means "no name".
#[inline]
pub(crate) fn normalize_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MyStruct;
    struct Repo<T>(T);
    trait Store {}

    #[test]
    fn key_of_type() {
        let key = TypeKey::of::<MyStruct>();
        assert!(key.type_name().contains("MyStruct"));
        assert_eq!(key.short_name(), "MyStruct");
        assert!(key.is::<MyStruct>());
    }

    #[test]
    fn key_equality_same_type() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<i32>());
    }

    #[test]
    fn generic_instantiations_share_definition() {
        let users = TypeKey::of::<Repo<u8>>();
        let orders = TypeKey::of::<Repo<u16>>();

        assert_ne!(users, orders);
        assert_eq!(users.definition(), orders.definition());
        assert!(users.is_generic());
        assert!(!TypeKey::of::<MyStruct>().is_generic());
    }

    #[test]
    fn trait_object_key() {
        let key = TypeKey::of::<dyn Store>();
        assert!(key.type_name().starts_with("dyn "));
        assert_eq!(key.short_name(), "dyn Store");
    }

    #[test]
    fn key_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(TypeKey::of::<String>(), "string");
        map.insert(TypeKey::of::<i32>(), "i32");
        assert_eq!(map.get(&TypeKey::of::<String>()), Some(&"string"));
        assert_eq!(map.get(&TypeKey::of::<bool>()), None);
    }

    #[test]
    fn empty_name_is_no_name() {
        assert_eq!(normalize_name(Some("")), None);
        assert_eq!(normalize_name(Some("primary")), Some("primary"));
        assert_eq!(normalize_name(None), None);
    }
}
