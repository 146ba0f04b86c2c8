//! Resolution registry: the union of all mapping tables.
//!
//! The registry owns one [`TypeMap`], one [`InstanceMap`] and one
//! [`FactoryMap`]. A single abstraction may appear in several tables at
//! once; the resolver decides which one answers.

use std::fmt;

use crate::catalog::Catalog;
use crate::key::TypeKey;
use crate::maps::{FactoryMap, InstanceMap, TypeMap};

/// Stores all mappings of a resolver.
///
/// Lives as long as the resolver; mappings are never removed.
pub struct ResolutionRegistry {
    type_map: TypeMap,
    instance_map: InstanceMap,
    factory_map: FactoryMap,
}

impl ResolutionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            type_map: TypeMap::new(),
            instance_map: InstanceMap::new(),
            factory_map: FactoryMap::new(),
        }
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn instance_map(&self) -> &InstanceMap {
        &self.instance_map
    }

    pub fn factory_map(&self) -> &FactoryMap {
        &self.factory_map
    }

    /// Returns `true` if any table holds `abstraction`.
    pub fn contains(&self, abstraction: &TypeKey) -> bool {
        self.factory_map.contains(abstraction)
            || self.instance_map.contains(abstraction)
            || self.type_map.contains(abstraction)
    }

    /// Every registered abstraction usable as `query`.
    ///
    /// Type mappings come first, then instances, then factories, each in
    /// registration order. An abstraction held by several tables appears
    /// once per table.
    pub fn registered_types_matching(&self, query: &TypeKey, catalog: &Catalog) -> Vec<TypeKey> {
        let mut types = self.type_map.registered_types_matching(query, catalog);
        types.extend(self.instance_map.registered_types_matching(query, catalog));
        types.extend(self.factory_map.registered_types_matching(query, catalog));
        types
    }

    /// Every registered abstraction, for "did you mean?" suggestions.
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        let mut keys = self.type_map.keys();
        keys.extend(self.instance_map.keys());
        keys.extend(self.factory_map.keys());
        keys
    }

    /// Number of registered abstractions across all tables.
    pub fn len(&self) -> usize {
        self.type_map.len() + self.instance_map.len() + self.factory_map.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResolutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolutionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionRegistry")
            .field("types", &self.type_map.len())
            .field("instances", &self.instance_map.len())
            .field("factories", &self.factory_map.len())
            .finish()
    }
}
