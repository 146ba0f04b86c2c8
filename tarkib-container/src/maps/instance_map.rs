//! Abstraction → pre-built instance mappings.

use std::fmt;

use tracing::debug;

use crate::catalog::Catalog;
use crate::key::TypeKey;
use crate::maps::{Added, MapEntry, Table};
use crate::value::{Instance, Shared};

/// A pre-built instance bound to an abstraction.
#[derive(Clone)]
pub struct MappedInstance {
    name: Option<String>,
    instance: Instance,
    // address of the shared value, not of the erased handle
    identity: usize,
}

impl MappedInstance {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl MapEntry for MappedInstance {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn same_target(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for MappedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedInstance")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Table of abstraction → instance mappings.
pub struct InstanceMap {
    table: Table<MappedInstance>,
}

impl InstanceMap {
    pub fn new() -> Self {
        Self { table: Table::new() }
    }

    /// Binds a shared value to `abstraction`. Re-adding the same value,
    /// under any name, is a no-op.
    pub fn add(&self, abstraction: TypeKey, shared: Shared, name: Option<&str>) {
        let entry = MappedInstance {
            name: name.map(str::to_owned),
            identity: shared.identity(),
            instance: shared.into_instance(),
        };

        if self.table.add(abstraction, entry) != Added::Unchanged {
            debug!(abstraction = %abstraction, name = ?name, "Registered instance");
        }
    }

    pub fn contains(&self, abstraction: &TypeKey) -> bool {
        self.table.contains(abstraction)
    }

    /// The instance bound under `name`, falling back to the first
    /// registered instance when no entry carries that name.
    pub fn get(&self, abstraction: &TypeKey, name: Option<&str>) -> Option<Instance> {
        let list = self.table.get(abstraction)?;

        name.and_then(|name| list.named(name))
            .or_else(|| list.first())
            .map(|entry| entry.instance.clone())
    }

    /// All instances bound to `abstraction`, in registration order.
    pub fn instances(&self, abstraction: &TypeKey) -> Vec<MappedInstance> {
        self.table
            .get(abstraction)
            .map(|list| list.entries().to_vec())
            .unwrap_or_default()
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

impl Default for InstanceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceMap")
            .field("abstractions", &self.table.len())
            .finish()
    }
}
