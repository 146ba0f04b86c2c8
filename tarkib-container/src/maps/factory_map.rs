//! Abstraction → factory mappings.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::key::TypeKey;
use crate::maps::{Added, MapEntry, Table};
use crate::value::Instance;

/// A zero-argument producer.
///
/// Invoked on every resolution; nothing is cached. Returning `None`
/// declines the request and lets the resolver try the other tables.
pub type Factory = Arc<dyn Fn() -> Option<Instance> + Send + Sync>;

/// A factory bound to an abstraction.
#[derive(Clone)]
pub struct MappedFactory {
    name: Option<String>,
    factory: Factory,
}

impl MappedFactory {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Runs the factory.
    pub fn produce(&self) -> Option<Instance> {
        (self.factory)()
    }
}

impl MapEntry for MappedFactory {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn same_target(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl fmt::Debug for MappedFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Table of abstraction → factory mappings.
pub struct FactoryMap {
    table: Table<MappedFactory>,
}

impl FactoryMap {
    pub fn new() -> Self {
        Self { table: Table::new() }
    }

    /// Binds `factory` to `abstraction`. Re-adding the same factory `Arc`
    /// is a no-op.
    pub fn add(&self, abstraction: TypeKey, factory: Factory, name: Option<&str>) {
        let entry = MappedFactory {
            name: name.map(str::to_owned),
            factory,
        };

        if self.table.add(abstraction, entry) != Added::Unchanged {
            debug!(abstraction = %abstraction, name = ?name, "Registered factory");
        }
    }

    pub fn contains(&self, abstraction: &TypeKey) -> bool {
        self.table.contains(abstraction)
    }

    /// Runs the factory bound under `name`, or the first factory when no
    /// name is given.
    ///
    /// An unmatched name yields `None`, as does a factory that declines.
    pub fn get(&self, abstraction: &TypeKey, name: Option<&str>) -> Option<Instance> {
        let list = self.table.get(abstraction)?;

        let entry = match name {
            Some(name) => list.named(name),
            None => list.first(),
        };

        let Some(entry) = entry else {
            trace!(abstraction = %abstraction, name = ?name, "No factory under this name");
            return None;
        };

        // the snapshot keeps the factory alive; no lock is held while it runs
        entry.produce()
    }

    pub fn keys(&self) -> Vec<TypeKey> {
        self.table.keys()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn registered_types_matching(&self, query: &TypeKey, catalog: &Catalog) -> Vec<TypeKey> {
        self.table.registered_types_matching(query, catalog)
    }
}

impl Default for FactoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FactoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMap")
            .field("abstractions", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::value::{downcast, erase};

    struct Ticket(u32);

    fn counting_factory(counter: Arc<AtomicU32>) -> Factory {
        Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Some(erase(Arc::new(Ticket(n))))
        })
    }

    #[test]
    fn factory_runs_on_every_get() {
        let map = FactoryMap::new();
        let key = TypeKey::of::<Ticket>();
        let counter = Arc::new(AtomicU32::new(0));

        map.add(key, counting_factory(counter.clone()), None);

        let a = map.get(&key, None).unwrap();
        let b = map.get(&key, None).unwrap();

        assert_eq!(downcast::<Ticket>(&a).unwrap().0, 0);
        assert_eq!(downcast::<Ticket>(&b).unwrap().0, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unmatched_name_yields_none() {
        let map = FactoryMap::new();
        let key = TypeKey::of::<Ticket>();

        map.add(key, counting_factory(Arc::new(AtomicU32::new(0))), Some("vip"));

        assert!(map.get(&key, Some("vip")).is_some());
        assert!(map.get(&key, Some("regular")).is_none());
        assert!(map.get(&key, None).is_some());
    }

    #[test]
    fn declining_factory_yields_none() {
        let map = FactoryMap::new();
        let key = TypeKey::of::<Ticket>();

        map.add(key, Arc::new(|| -> Option<Instance> { None }), None);

        assert!(map.contains(&key));
        assert!(map.get(&key, None).is_none());
    }

    #[test]
    fn same_factory_twice_is_noop() {
        let map = FactoryMap::new();
        let key = TypeKey::of::<Ticket>();
        let factory = counting_factory(Arc::new(AtomicU32::new(0)));

        map.add(key, factory.clone(), None);
        map.add(key, factory, Some("dup"));

        assert!(map.get(&key, Some("dup")).is_none());
        assert_eq!(map.len(), 1);
    }
}
