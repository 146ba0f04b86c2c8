//! Abstraction → concrete type mappings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::candidate::{ConstructorCandidate, Injectable, TypeDescriptor};
use crate::catalog::{Catalog, Implements, Upcast, upcast};
use crate::error::{InvalidMappingError, Result, TarkibError};
use crate::key::TypeKey;
use crate::maps::{Added, MapEntry, MapList, Table};
use crate::value::Instance;

/// Everything needed to map an abstraction to a concrete type.
#[derive(Clone)]
pub struct TypeRegistration {
    abstraction: TypeKey,
    descriptor: TypeDescriptor,
    upcast: Upcast,
}

impl TypeRegistration {
    /// Maps abstraction `A` to concrete type `C`.
    pub fn new<A, C>() -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        C: Injectable + Implements<A>,
    {
        Self {
            abstraction: TypeKey::of::<A>(),
            descriptor: C::descriptor(),
            upcast: upcast::<C, A>,
        }
    }

    /// Maps `abstraction` to `concrete` using only catalog knowledge.
    ///
    /// # Errors
    /// [`TarkibError::InvalidMapping`] if `concrete` is not a known
    /// injectable type or is not assignable to `abstraction`.
    pub fn from_catalog(abstraction: TypeKey, concrete: TypeKey, catalog: &Catalog) -> Result<Self> {
        let descriptor = catalog.descriptor(&concrete).cloned().ok_or_else(|| {
            invalid(abstraction, concrete, "not a concrete injectable type")
        })?;

        let upcast = catalog.upcast(&concrete, &abstraction).ok_or_else(|| {
            invalid(abstraction, concrete, "the type does not implement the abstraction")
        })?;

        Ok(Self { abstraction, descriptor, upcast })
    }

    /// The abstraction being mapped.
    pub fn abstraction(&self) -> TypeKey {
        self.abstraction
    }

    /// The concrete target.
    pub fn concrete(&self) -> TypeKey {
        self.descriptor.concrete()
    }
}

impl fmt::Debug for TypeRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistration")
            .field("abstraction", &self.abstraction)
            .field("concrete", &self.descriptor.concrete())
            .finish()
    }
}

/// A registered abstraction → concrete mapping.
///
/// Owns the ranked candidate list of the concrete type, built once when the
/// mapping is created and never changed afterwards.
#[derive(Clone)]
pub struct MappedType {
    abstraction: TypeKey,
    name: Option<String>,
    concrete: TypeKey,
    candidates: Arc<[ConstructorCandidate]>,
    upcast: Upcast,
}

impl MappedType {
    fn build(registration: TypeRegistration, name: Option<&str>) -> Self {
        Self {
            abstraction: registration.abstraction,
            name: name.map(str::to_owned),
            concrete: registration.descriptor.concrete(),
            candidates: registration.descriptor.candidates().into(),
            upcast: registration.upcast,
        }
    }

    pub fn abstraction(&self) -> TypeKey {
        self.abstraction
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn concrete(&self) -> TypeKey {
        self.concrete
    }

    /// Constructor candidates, most parameters first.
    pub fn candidates(&self) -> &[ConstructorCandidate] {
        &self.candidates
    }

    /// Views a constructed concrete instance as the abstraction.
    pub fn upcast(&self, instance: &Instance) -> Result<Instance> {
        (self.upcast)(instance).ok_or_else(|| {
            TarkibError::construction(
                self.concrete,
                format!("constructed value cannot be viewed as {}", self.abstraction),
            )
        })
    }
}

impl MapEntry for MappedType {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn same_target(&self, other: &Self) -> bool {
        self.concrete == other.concrete
    }
}

impl fmt::Debug for MappedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedType")
            .field("abstraction", &self.abstraction)
            .field("name", &self.name)
            .field("concrete", &self.concrete)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}

/// An open-generic mapping.
///
/// Generics are monomorphised at compile time, so a family lists the
/// instantiations it can close, each as a closed abstraction → closed
/// concrete pair. Nothing is built until a closed abstraction is first
/// requested; it is then cached as an ordinary mapping.
///
/// ```rust,ignore
/// let family = GenericFamily::new()
///     .close::<dyn Repository<User>, SqlRepository<User>>()
///     .close::<dyn Repository<Order>, SqlRepository<Order>>();
/// resolver.register_generic(family)?;
/// ```
#[derive(Clone, Default)]
pub struct GenericFamily {
    closings: IndexMap<TypeKey, fn() -> TypeRegistration>,
}

impl GenericFamily {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the instantiation `A` → `C`.
    pub fn close<A, C>(mut self) -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        C: Injectable + Implements<A>,
    {
        self.closings.insert(TypeKey::of::<A>(), TypeRegistration::new::<A, C>);
        self
    }

    /// The generic definition shared by every closed abstraction.
    ///
    /// # Errors
    /// [`TarkibError::InvalidMapping`] if the family is empty, not generic,
    /// or mixes definitions.
    pub fn definition(&self) -> Result<&'static str> {
        let mut keys = self.closings.keys();
        let first = keys.next().filter(|k| k.is_generic()).ok_or_else(|| {
            let key = self.closings.keys().next().copied().unwrap_or(TypeKey::of::<()>());
            invalid(key, key, "a generic family needs at least one generic instantiation")
        })?;

        if let Some(other) = keys.find(|k| k.definition() != first.definition()) {
            return Err(invalid(
                *other,
                *first,
                "all instantiations of a generic family must share one definition",
            ));
        }

        Ok(first.definition())
    }

    fn closing(&self, abstraction: &TypeKey) -> Option<fn() -> TypeRegistration> {
        self.closings.get(abstraction).copied()
    }

    fn merge(&mut self, other: GenericFamily) {
        for (key, close) in other.closings {
            self.closings.entry(key).or_insert(close);
        }
    }
}

impl fmt::Debug for GenericFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericFamily")
            .field("closings", &self.closings.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Table of abstraction → concrete type mappings.
pub struct TypeMap {
    table: Table<MappedType>,
    families: RwLock<HashMap<&'static str, GenericFamily>>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
            families: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a mapping under an optional name.
    ///
    /// The candidate list is built here, before the mapping becomes
    /// visible to other threads. Re-adding the same concrete type under
    /// the same abstraction is a no-op.
    ///
    /// # Errors
    /// [`TarkibError::InvalidMapping`] if the concrete type has no
    /// constructors.
    pub fn add(&self, registration: TypeRegistration, name: Option<&str>) -> Result<()> {
        let abstraction = registration.abstraction;
        let concrete = registration.concrete();

        if registration.descriptor.is_empty() {
            warn!(abstraction = %abstraction, concrete = %concrete, "Rejected mapping without constructors");
            return Err(invalid(abstraction, concrete, "the type declares no public constructors"));
        }

        let outcome = self.table.add(abstraction, MappedType::build(registration, name));
        if outcome != Added::Unchanged {
            debug!(abstraction = %abstraction, concrete = %concrete, name = ?name, "Registered type mapping");
        }
        Ok(())
    }

    pub fn contains(&self, abstraction: &TypeKey) -> bool {
        self.table.contains(abstraction)
    }

    /// Registers an open-generic family.
    pub fn add_generic(&self, family: GenericFamily) -> Result<()> {
        let definition = family.definition()?;
        let mut families = self.families.write();
        families.entry(definition).or_default().merge(family);
        debug!(definition, "Registered generic family");
        Ok(())
    }

    /// Looks up the mapping for `abstraction`.
    ///
    /// Closes a generic family on first request of one of its
    /// instantiations. With a name, only the entry bound under that name
    /// matches; without one, the first-registered entry is returned.
    pub fn get_mapped_type(&self, abstraction: &TypeKey, name: Option<&str>) -> Result<Option<MappedType>> {
        if !self.table.contains(abstraction) && abstraction.is_generic() {
            self.close_generic(abstraction)?;
        }

        let Some(list) = self.table.get(abstraction) else {
            return Ok(None);
        };

        Ok(select(&list, name).cloned())
    }

    /// All mappings registered under `abstraction`.
    pub fn mapped_types(&self, abstraction: &TypeKey) -> Vec<MappedType> {
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

    fn close_generic(&self, abstraction: &TypeKey) -> Result<()> {
        let known = self
            .families
            .read()
            .get(abstraction.definition())
            .is_some_and(|family| family.closing(abstraction).is_some());
        if !known {
            return Ok(());
        }

        // held for the whole close so one thread builds each instantiation
        let families = self.families.write();

        if self.table.contains(abstraction) {
            return Ok(());
        }

        let Some(close) = families
            .get(abstraction.definition())
            .and_then(|family| family.closing(abstraction))
        else {
            return Ok(());
        };

        trace!(abstraction = %abstraction, "Closing generic mapping");
        self.add(close(), None)
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMap")
            .field("abstractions", &self.table.len())
            .field("families", &self.families.read().len())
            .finish()
    }
}

fn select<'a>(list: &'a MapList<MappedType>, name: Option<&str>) -> Option<&'a MappedType> {
    match name {
        Some(name) => list.named(name),
        None => list.first(),
    }
}

fn invalid(abstraction: TypeKey, concrete: TypeKey, reason: &str) -> TarkibError {
    TarkibError::InvalidMapping(InvalidMappingError {
        abstraction,
        concrete,
        reason: reason.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Constructor;
    use crate::value::{downcast, erase};

    trait Notifier: Send + Sync {
        fn channel(&self) -> &'static str;
    }

    struct Email;
    struct Sms;

    impl Notifier for Email {
        fn channel(&self) -> &'static str {
            "email"
        }
    }

    impl Notifier for Sms {
        fn channel(&self) -> &'static str {
            "sms"
        }
    }

    impl Injectable for Email {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_| Ok(Email))]
        }
    }

    impl Injectable for Sms {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_| Ok(Sms))]
        }
    }

    crate::implements!(Email => dyn Notifier);
    crate::implements!(Sms => dyn Notifier);
    crate::injectable_types!(Email, Sms);

    struct Abstract;

    impl Injectable for Abstract {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![]
        }
    }

    trait Store<T>: Send + Sync {
        fn kind(&self) -> &'static str;
    }

    struct MemoryStore<T>(std::marker::PhantomData<T>);

    impl<T: Send + Sync + 'static> Store<T> for MemoryStore<T> {
        fn kind(&self) -> &'static str {
            "memory"
        }
    }

    impl<T: Send + Sync + 'static> Injectable for MemoryStore<T> {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_| Ok(MemoryStore(std::marker::PhantomData)))]
        }
    }

    impl<T: Send + Sync + 'static> Implements<dyn Store<T>> for MemoryStore<T> {
        fn upcast(self: Arc<Self>) -> Arc<dyn Store<T>> {
            self
        }
    }

    #[test]
    fn default_and_named_lookup() {
        let map = TypeMap::new();
        let key = TypeKey::of::<dyn Notifier>();

        map.add(TypeRegistration::new::<dyn Notifier, Email>(), None).unwrap();
        map.add(TypeRegistration::new::<dyn Notifier, Sms>(), Some("sms")).unwrap();

        let first = map.get_mapped_type(&key, None).unwrap().unwrap();
        assert!(first.concrete().is::<Email>());

        let named = map.get_mapped_type(&key, Some("sms")).unwrap().unwrap();
        assert!(named.concrete().is::<Sms>());

        assert!(map.get_mapped_type(&key, Some("push")).unwrap().is_none());
    }

    #[test]
    fn re_adding_same_target_is_noop() {
        let map = TypeMap::new();
        let key = TypeKey::of::<dyn Notifier>();

        map.add(TypeRegistration::new::<dyn Notifier, Email>(), None).unwrap();
        map.add(TypeRegistration::new::<dyn Notifier, Email>(), None).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.mapped_types(&key).len(), 1);
        assert_eq!(map.mapped_types(&key)[0].candidates().len(), 1);
    }

    #[test]
    fn mapping_without_constructors_is_invalid() {
        let map = TypeMap::new();
        let err = map.add(TypeRegistration::new::<Abstract, Abstract>(), None).unwrap_err();
        assert!(matches!(err, TarkibError::InvalidMapping(_)));
        assert!(map.is_empty());
    }

    #[test]
    fn catalog_registration_checks_assignability() {
        let catalog = Catalog::global();

        let ok = TypeRegistration::from_catalog(
            TypeKey::of::<dyn Notifier>(),
            TypeKey::of::<Email>(),
            catalog,
        );
        assert!(ok.is_ok());

        let not_concrete = TypeRegistration::from_catalog(
            TypeKey::of::<dyn Notifier>(),
            TypeKey::of::<dyn Notifier>(),
            catalog,
        );
        assert!(matches!(not_concrete, Err(TarkibError::InvalidMapping(_))));

        let not_assignable = TypeRegistration::from_catalog(
            TypeKey::of::<String>(),
            TypeKey::of::<Email>(),
            catalog,
        );
        assert!(matches!(not_assignable, Err(TarkibError::InvalidMapping(_))));
    }

    #[test]
    fn mapped_type_upcasts_to_abstraction() {
        let map = TypeMap::new();
        map.add(TypeRegistration::new::<dyn Notifier, Sms>(), None).unwrap();

        let mapped = map
            .get_mapped_type(&TypeKey::of::<dyn Notifier>(), None)
            .unwrap()
            .unwrap();
        let concrete = mapped.candidates()[0].invoke(&[]).unwrap();
        let abstraction = mapped.upcast(&concrete).unwrap();

        assert_eq!(downcast::<dyn Notifier>(&abstraction).unwrap().channel(), "sms");
        assert!(mapped.upcast(&erase(Arc::new(1u8))).is_err());
    }

    #[test]
    fn generic_family_closes_on_first_request() {
        let map = TypeMap::new();
        let family = GenericFamily::new()
            .close::<dyn Store<u8>, MemoryStore<u8>>()
            .close::<dyn Store<u16>, MemoryStore<u16>>();
        map.add_generic(family).unwrap();

        let key = TypeKey::of::<dyn Store<u8>>();
        assert!(!map.contains(&key));

        let mapped = map.get_mapped_type(&key, None).unwrap().unwrap();
        assert!(mapped.concrete().is::<MemoryStore<u8>>());
        assert!(map.contains(&key));
        assert!(!map.contains(&TypeKey::of::<dyn Store<u16>>()));

        map.get_mapped_type(&key, None).unwrap();
        assert_eq!(map.mapped_types(&key).len(), 1);
    }

    #[test]
    fn unknown_instantiation_is_absent() {
        let map = TypeMap::new();
        map.add_generic(GenericFamily::new().close::<dyn Store<u8>, MemoryStore<u8>>())
            .unwrap();

        let missing = map.get_mapped_type(&TypeKey::of::<dyn Store<u32>>(), None).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn unrelated_generic_lookup_only_reads_families() {
        let map = TypeMap::new();
        map.add_generic(GenericFamily::new().close::<dyn Store<u8>, MemoryStore<u8>>())
            .unwrap();

        // a held reader would block a writer on this thread
        let _reader = map.families.read();
        let missing = map.get_mapped_type(&TypeKey::of::<Vec<String>>(), None).unwrap();
        assert!(missing.is_none());
        let missing = map.get_mapped_type(&TypeKey::of::<dyn Store<u32>>(), None).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn family_must_share_definition() {
        let mixed = GenericFamily::new()
            .close::<dyn Store<u8>, MemoryStore<u8>>()
            .close::<MemoryStore<u16>, MemoryStore<u16>>();
        assert!(mixed.definition().is_err());

        let not_generic = GenericFamily::new().close::<dyn Notifier, Email>();
        assert!(not_generic.definition().is_err());
    }
}
