//! Mapping tables keyed by abstraction.
//!
//! Three independent tables answer resolution requests:
//! - [`TypeMap`]: abstraction → concrete type (constructed on demand)
//! - [`InstanceMap`]: abstraction → pre-built instance
//! - [`FactoryMap`]: abstraction → zero-argument producer
//!
//! All three share [`Table`]: an insertion-ordered map from abstraction to
//! an immutable [`MapList`] of entries. Lists are never edited in place;
//! appending publishes a new list under the write lock, so a reader always
//! sees a complete list.

mod factory_map;
mod instance_map;
mod type_map;

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::catalog::Catalog;
use crate::key::TypeKey;

pub use factory_map::{Factory, FactoryMap, MappedFactory};
pub use instance_map::{InstanceMap, MappedInstance};
pub use type_map::{GenericFamily, MappedType, TypeMap, TypeRegistration};

/// One entry of a [`MapList`].
pub trait MapEntry: Clone {
    /// The binding name, if any.
    fn name(&self) -> Option<&str>;

    /// Returns `true` if both entries bind the same target.
    fn same_target(&self, other: &Self) -> bool;
}

/// The entries registered for one abstraction, in registration order.
#[derive(Debug)]
pub struct MapList<E> {
    abstraction: TypeKey,
    entries: Vec<E>,
}

impl<E: MapEntry> MapList<E> {
    fn single(abstraction: TypeKey, entry: E) -> Self {
        Self { abstraction, entries: vec![entry] }
    }

    /// The abstraction all entries are registered under.
    pub fn abstraction(&self) -> TypeKey {
        self.abstraction
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// The first-registered entry.
    pub fn first(&self) -> Option<&E> {
        self.entries.first()
    }

    /// The entry bound under `name`.
    pub fn named(&self, name: &str) -> Option<&E> {
        self.entries.iter().find(|e| e.name() == Some(name))
    }

    fn contains_target(&self, entry: &E) -> bool {
        self.entries.iter().any(|e| e.same_target(entry))
    }

    fn appended(&self, entry: E) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend(self.entries.iter().cloned());
        entries.push(entry);
        Self { abstraction: self.abstraction, entries }
    }
}

/// Outcome of [`Table::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Added {
    /// A new abstraction entry was created.
    Created,
    /// The target was appended to an existing abstraction.
    Appended,
    /// The same target was already registered.
    Unchanged,
}

/// Insertion-ordered abstraction → entries table.
pub(crate) struct Table<E> {
    lists: RwLock<IndexMap<TypeKey, Arc<MapList<E>>>>,
}

impl<E: MapEntry> Table<E> {
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(IndexMap::new()),
        }
    }

    /// Registers `entry` under `abstraction`.
    ///
    /// Idempotent per identical target. The first registration creates the
    /// abstraction entry; later distinct targets are appended.
    pub fn add(&self, abstraction: TypeKey, entry: E) -> Added {
        if let Some(list) = self.get(&abstraction) {
            if list.contains_target(&entry) {
                return Added::Unchanged;
            }
        }

        let mut lists = self.lists.write();
        match lists.get(&abstraction) {
            None => {
                lists.insert(abstraction, Arc::new(MapList::single(abstraction, entry)));
                Added::Created
            }
            Some(list) if list.contains_target(&entry) => Added::Unchanged,
            Some(list) => {
                let next = Arc::new(list.appended(entry));
                lists.insert(abstraction, next);
                Added::Appended
            }
        }
    }

    pub fn contains(&self, abstraction: &TypeKey) -> bool {
        self.lists.read().contains_key(abstraction)
    }

    /// A snapshot of the entries registered for `abstraction`.
    pub fn get(&self, abstraction: &TypeKey) -> Option<Arc<MapList<E>>> {
        self.lists.read().get(abstraction).cloned()
    }

    pub fn len(&self) -> usize {
        self.lists.read().len()
    }

    /// All abstraction keys, in insertion order.
    pub fn keys(&self) -> Vec<TypeKey> {
        self.lists.read().keys().copied().collect()
    }

    /// Abstractions whose values can be used as `query`, in insertion order.
    pub fn registered_types_matching(&self, query: &TypeKey, catalog: &Catalog) -> Vec<TypeKey> {
        let matches: Vec<TypeKey> = self
            .lists
            .read()
            .keys()
            .filter(|key| catalog.is_assignable(key, query))
            .copied()
            .collect();

        trace!(query = %query, matches = matches.len(), "Matched registered types");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Tag {
        name: Option<String>,
        target: u32,
    }

    impl MapEntry for Tag {
        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn same_target(&self, other: &Self) -> bool {
            self.target == other.target
        }
    }

    fn tag(name: Option<&str>, target: u32) -> Tag {
        Tag { name: name.map(String::from), target }
    }

    struct Key;

    #[test]
    fn first_add_creates_then_appends() {
        let table = Table::new();
        let key = TypeKey::of::<Key>();

        assert_eq!(table.add(key, tag(None, 1)), Added::Created);
        assert_eq!(table.add(key, tag(Some("b"), 2)), Added::Appended);

        let list = table.get(&key).unwrap();
        assert_eq!(list.entries().len(), 2);
        assert_eq!(list.first().unwrap().target, 1);
        assert_eq!(list.named("b").unwrap().target, 2);
        assert!(list.named("missing").is_none());
    }

    #[test]
    fn same_target_is_idempotent() {
        let table = Table::new();
        let key = TypeKey::of::<Key>();

        table.add(key, tag(None, 1));
        assert_eq!(table.add(key, tag(Some("other"), 1)), Added::Unchanged);
        assert_eq!(table.get(&key).unwrap().entries().len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn snapshots_are_not_affected_by_appends() {
        let table = Table::new();
        let key = TypeKey::of::<Key>();

        table.add(key, tag(None, 1));
        let before = table.get(&key).unwrap();
        table.add(key, tag(Some("b"), 2));

        assert_eq!(before.entries().len(), 1);
        assert_eq!(table.get(&key).unwrap().entries().len(), 2);
    }

    #[test]
    fn keys_keep_insertion_order() {
        let table = Table::new();
        table.add(TypeKey::of::<u8>(), tag(None, 1));
        table.add(TypeKey::of::<Key>(), tag(None, 2));
        table.add(TypeKey::of::<u16>(), tag(None, 3));

        let keys = table.keys();
        assert!(keys[0].is::<u8>());
        assert!(keys[1].is::<Key>());
        assert!(keys[2].is::<u16>());
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let table = Arc::new(Table::new());
        let key = TypeKey::of::<Key>();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let table = table.clone();
                std::thread::spawn(move || {
                    let name = format!("n{i}");
                    table.add(key, tag(Some(&name), i));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.get(&key).unwrap().entries().len(), 8);
    }
}
