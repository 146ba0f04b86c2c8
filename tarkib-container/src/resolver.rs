//! # The Resolver: heart of Tarkib
//!
//! Answers "give me something usable as `A`" from three kinds of mappings:
//! factories, pre-built instances and type mappings. For type mappings it
//! picks a constructor, resolves the constructor's parameters recursively,
//! and hands the result to the configured construction strategy.
//!
//! # Architecture
//! ```text
//! ResolverBuilder ──build()──> TypeResolver
//!                                   │
//!                     ┌─────────────┼─────────────┐
//!                     ▼             ▼             ▼
//!               FactoryMap     InstanceMap     TypeMap ──> ConstructionStrategy
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tarkib_container::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String {
//!         format!("[console] {msg}")
//!     }
//! }
//!
//! impl Injectable for ConsoleLogger {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|_| Ok(ConsoleLogger))]
//!     }
//! }
//!
//! tarkib_container::implements!(ConsoleLogger => dyn Logger);
//!
//! let resolver = TypeResolver::builder().build();
//! resolver.register_type::<dyn Logger, ConsoleLogger>().unwrap();
//!
//! let logger: Arc<dyn Logger> = resolver.resolve().unwrap();
//! assert_eq!(logger.log("hi"), "[console] hi");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tarkib_support::rendering::suggest_similar;
use tracing::{debug, info, instrument, trace};

use crate::candidate::{ConstructorCandidate, Injectable};
use crate::catalog::{Catalog, Implements};
use crate::error::{RegistrationNotFoundError, Result, TarkibError};
use crate::key::{TypeKey, normalize_name};
use crate::maps::{Factory, GenericFamily, MappedType, TypeRegistration};
use crate::path::ResolutionPath;
use crate::provider::{Provider, ProviderRegistry};
use crate::registry::ResolutionRegistry;
use crate::strategy::{CompiledStrategy, ConstructionStrategy, ReflectiveStrategy};
use crate::value::{Instance, Shared, downcast, erase};

// ═══════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════

/// Which construction strategy a resolver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Invoke constructor handles directly.
    Reflective,
    /// Prepare and cache one activator per constructor.
    #[default]
    Compiled,
}

/// Resolver configuration.
///
/// Deserializable, so it can live in an application's config file:
///
/// ```
/// use tarkib_container::resolver::{ResolverSettings, StrategyKind};
///
/// let settings: ResolverSettings =
///     serde_json::from_str(r#"{ "strategy": "reflective" }"#).unwrap();
/// assert_eq!(settings.strategy, StrategyKind::Reflective);
/// assert!(settings.detect_cycles);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub strategy: StrategyKind,
    /// Fail with `CycleDetected` instead of recursing forever.
    pub detect_cycles: bool,
    /// Upper bound on "did you mean?" suggestions per error.
    pub max_suggestions: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            detect_cycles: true,
            max_suggestions: 3,
        }
    }
}

// ═══════════════════════════════════════════
// ConstructorParameter
// ═══════════════════════════════════════════

/// An explicit constructor argument, matched to a parameter by name.
///
/// The value must be erased as the parameter's declared type: a parameter
/// taken as `Arc<X>` wants an `Arc<X>`, a parameter taken by value `T`
/// wants a `T`.
#[derive(Clone)]
pub struct ConstructorParameter {
    name: String,
    value: Instance,
}

impl ConstructorParameter {
    /// A shared argument.
    pub fn new<T>(name: impl Into<String>, value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            value: erase(value),
        }
    }

    /// An owned argument.
    pub fn owned<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self::new(name, Arc::new(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &Instance {
        &self.value
    }
}

impl fmt::Debug for ConstructorParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorParameter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════
// ResolverBuilder
// ═══════════════════════════════════════════

/// Builds a [`TypeResolver`].
///
/// # Examples
/// ```rust,ignore
/// let resolver = TypeResolver::builder()
///     .strategy(StrategyKind::Reflective)
///     .detect_cycles(false)
///     .build();
/// ```
pub struct ResolverBuilder {
    settings: ResolverSettings,
    custom: Option<Arc<dyn ConstructionStrategy>>,
}

impl ResolverBuilder {
    fn new() -> Self {
        Self {
            settings: ResolverSettings::default(),
            custom: None,
        }
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Selects a built-in construction strategy.
    pub fn strategy(mut self, kind: StrategyKind) -> Self {
        self.settings.strategy = kind;
        self
    }

    /// Uses a custom construction strategy instead of a built-in one.
    pub fn with_strategy(mut self, strategy: impl ConstructionStrategy + 'static) -> Self {
        self.custom = Some(Arc::new(strategy));
        self
    }

    pub fn detect_cycles(mut self, detect: bool) -> Self {
        self.settings.detect_cycles = detect;
        self
    }

    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.settings.max_suggestions = max;
        self
    }

    pub fn build(self) -> TypeResolver {
        let strategy: Arc<dyn ConstructionStrategy> = match self.custom {
            Some(custom) => custom,
            None => match self.settings.strategy {
                StrategyKind::Reflective => Arc::new(ReflectiveStrategy),
                StrategyKind::Compiled => Arc::new(CompiledStrategy::new()),
            },
        };

        info!(
            strategy = strategy.name(),
            detect_cycles = self.settings.detect_cycles,
            "Resolver built"
        );

        TypeResolver {
            registry: ResolutionRegistry::new(),
            strategy,
            catalog: Catalog::global(),
            settings: self.settings,
        }
    }
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════
// TypeResolver
// ═══════════════════════════════════════════

/// Thread-safe resolution engine.
///
/// Registration and resolution may interleave freely from any thread.
/// Share it behind an `Arc`; factories that need the resolver capture
/// that `Arc`.
pub struct TypeResolver {
    registry: ResolutionRegistry,
    strategy: Arc<dyn ConstructionStrategy>,
    catalog: &'static Catalog,
    settings: ResolverSettings,
}

impl TypeResolver {
    /// Create a new builder.
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    /// A resolver with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Name of the active construction strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// The underlying mapping tables.
    pub fn registry(&self) -> &ResolutionRegistry {
        &self.registry
    }

    // ── Type mappings ──

    /// Maps abstraction `A` to concrete type `C`.
    ///
    /// ```rust,ignore
    /// resolver.register_type::<dyn Repository, SqlRepository>()?;
    /// ```
    ///
    /// # Errors
    /// [`TarkibError::InvalidMapping`] if `C` declares no constructors.
    pub fn register_type<A, C>(&self) -> Result<()>
    where
        A: ?Sized + Send + Sync + 'static,
        C: Injectable + Implements<A>,
    {
        self.add_type(TypeRegistration::new::<A, C>(), None)
    }

    /// Maps abstraction `A` to concrete type `C` under `name`.
    pub fn register_type_named<A, C>(&self, name: &str) -> Result<()>
    where
        A: ?Sized + Send + Sync + 'static,
        C: Injectable + Implements<A>,
    {
        self.add_type(TypeRegistration::new::<A, C>(), Some(name))
    }

    /// Maps `abstraction` to `concrete` by key, using the type catalog.
    ///
    /// # Errors
    /// [`TarkibError::InvalidMapping`] if `concrete` is not a catalogued
    /// injectable type or does not implement `abstraction`.
    pub fn register_mapping(
        &self,
        abstraction: TypeKey,
        concrete: TypeKey,
        name: Option<&str>,
    ) -> Result<()> {
        let registration = TypeRegistration::from_catalog(abstraction, concrete, self.catalog)?;
        self.add_type(registration, name)
    }

    /// Registers an open-generic family.
    pub fn register_generic(&self, family: GenericFamily) -> Result<()> {
        self.registry.type_map().add_generic(family)
    }

    fn add_type(&self, registration: TypeRegistration, name: Option<&str>) -> Result<()> {
        let name = normalize_name(name);
        let abstraction = registration.abstraction();
        let concrete = registration.concrete();

        self.registry.type_map().add(registration, name)?;

        // prepare now so the first resolution does not pay for it
        let mapped = self
            .registry
            .type_map()
            .mapped_types(&abstraction)
            .into_iter()
            .find(|m| m.concrete() == concrete);

        if let Some(mapped) = mapped {
            self.strategy.register(&concrete, &mapped, &self.registry)?;
        }
        Ok(())
    }

    // ── Instances ──

    /// Binds a pre-built instance to `A`.
    ///
    /// Resolving `A` returns this exact `Arc`.
    pub fn register_instance<A>(&self, instance: Arc<A>)
    where
        A: ?Sized + Send + Sync + 'static,
    {
        self.register_instance_key(TypeKey::of::<A>(), Shared::new(instance), None);
    }

    /// Binds a pre-built instance to `A` under `name`.
    pub fn register_instance_named<A>(&self, instance: Arc<A>, name: &str)
    where
        A: ?Sized + Send + Sync + 'static,
    {
        self.register_instance_key(TypeKey::of::<A>(), Shared::new(instance), Some(name));
    }

    /// Binds an erased instance by key.
    ///
    /// The payload must be an `Arc` of the abstraction type. Binding the
    /// same `Arc` again is a no-op, whichever path registered it first.
    pub fn register_instance_key(&self, abstraction: TypeKey, instance: Shared, name: Option<&str>) {
        self.registry
            .instance_map()
            .add(abstraction, instance, normalize_name(name));
    }

    // ── Factories ──

    /// Binds a factory to `A`. The factory runs on every resolution;
    /// returning `None` lets the resolver try instances and type mappings.
    ///
    /// ```rust,ignore
    /// let counter = Arc::new(AtomicU32::new(0));
    /// resolver.register_factory::<Ticket>(move || {
    ///     Some(Arc::new(Ticket(counter.fetch_add(1, Ordering::SeqCst))))
    /// });
    /// ```
    pub fn register_factory<A>(&self, factory: impl Fn() -> Option<Arc<A>> + Send + Sync + 'static)
    where
        A: ?Sized + Send + Sync + 'static,
    {
        self.register_factory_key(TypeKey::of::<A>(), erased_factory(factory), None);
    }

    /// Binds a factory to `A` under `name`.
    pub fn register_factory_named<A>(
        &self,
        factory: impl Fn() -> Option<Arc<A>> + Send + Sync + 'static,
        name: &str,
    ) where
        A: ?Sized + Send + Sync + 'static,
    {
        self.register_factory_key(TypeKey::of::<A>(), erased_factory(factory), Some(name));
    }

    /// Binds an erased factory by key.
    pub fn register_factory_key(&self, abstraction: TypeKey, factory: Factory, name: Option<&str>) {
        self.registry
            .factory_map()
            .add(abstraction, factory, normalize_name(name));
    }

    // ── Provider modules ──

    /// Runs a [`Provider`] module against this resolver.
    #[instrument(skip(self, provider), name = "load_provider", fields(provider = provider.name()))]
    pub fn add_provider(&self, provider: &dyn Provider) -> Result<()> {
        let before = self.registry.len();
        provider.register(self)?;

        info!(added = self.registry.len() - before, "Provider loaded");
        Ok(())
    }

    // ── Resolution ──

    /// Resolves `A`.
    ///
    /// ```rust,ignore
    /// let repo: Arc<dyn Repository> = resolver.resolve()?;
    /// ```
    pub fn resolve<A: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<A>> {
        self.resolve_typed(None, &[])
    }

    /// Resolves the binding of `A` registered under `name`.
    pub fn resolve_named<A: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<A>> {
        self.resolve_typed(Some(name), &[])
    }

    /// Resolves `A`, feeding `arguments` to constructor parameters of the
    /// same name.
    pub fn resolve_with<A: ?Sized + Send + Sync + 'static>(
        &self,
        arguments: &[ConstructorParameter],
    ) -> Result<Arc<A>> {
        self.resolve_typed(None, arguments)
    }

    pub fn resolve_named_with<A: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        arguments: &[ConstructorParameter],
    ) -> Result<Arc<A>> {
        self.resolve_typed(Some(name), arguments)
    }

    /// Resolves `key` without static typing.
    ///
    /// # Errors
    /// - [`TarkibError::RegistrationNotFound`]: nothing answers the request,
    ///   or a constructor parameter has no value
    /// - [`TarkibError::CycleDetected`]: the graph loops back on itself
    /// - [`TarkibError::ConstructionFailed`]: a constructor failed
    pub fn resolve_key(
        &self,
        key: TypeKey,
        name: Option<&str>,
        arguments: &[ConstructorParameter],
    ) -> Result<Instance> {
        let name = normalize_name(name);
        trace!(key = %key, name = ?name, "Resolving");

        let mut path = ResolutionPath::new(key, name, self.settings.detect_cycles);
        match self.get(key, name, arguments, &mut path)? {
            Some(instance) => Ok(instance),
            None => Err(self.not_found(key, name, None, None)),
        }
    }

    /// Resolves every registered abstraction usable as `A`.
    ///
    /// Type mappings come first, then instances, then factories, each in
    /// registration order. Factories that decline are skipped.
    pub fn resolve_all<A: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<A>>> {
        let key = TypeKey::of::<A>();
        self.resolve_all_key(key)?
            .iter()
            .map(|instance| cast::<A>(key, instance))
            .collect()
    }

    /// Resolves every registered abstraction usable as `query`, each viewed
    /// as `query`.
    #[instrument(skip(self, query), name = "resolve_all", fields(query = %query))]
    pub fn resolve_all_key(&self, query: TypeKey) -> Result<Vec<Instance>> {
        let matches = self.registry.registered_types_matching(&query, self.catalog);
        let mut all = Vec::with_capacity(matches.len());

        for key in matches {
            let mut path = ResolutionPath::new(key, None, self.settings.detect_cycles);
            let Some(instance) = self.get(key, None, &[], &mut path)? else {
                trace!(key = %key, "Nothing produced, skipping");
                continue;
            };

            let upcast = self.catalog.upcast(&key, &query).ok_or_else(|| {
                TarkibError::construction(key, format!("no cast to {query}"))
            })?;
            let instance = upcast(&instance).ok_or_else(|| {
                TarkibError::construction(key, format!("resolved value cannot be viewed as {query}"))
            })?;
            all.push(instance);
        }

        debug!(count = all.len(), "Resolved all matches");
        Ok(all)
    }

    /// Returns `true` if any table holds a mapping for `key`.
    pub fn is_registered_key(&self, key: &TypeKey) -> bool {
        self.registry.contains(key)
    }

    pub fn is_registered<A: ?Sized + 'static>(&self) -> bool {
        self.is_registered_key(&TypeKey::of::<A>())
    }

    // ── Internal ──

    fn resolve_typed<A: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
        arguments: &[ConstructorParameter],
    ) -> Result<Arc<A>> {
        let key = TypeKey::of::<A>();
        let instance = self.resolve_key(key, name, arguments)?;
        cast::<A>(key, &instance)
    }

    /// One resolution step: factory, instance, then type mapping.
    fn get(
        &self,
        key: TypeKey,
        name: Option<&str>,
        arguments: &[ConstructorParameter],
        path: &mut ResolutionPath,
    ) -> Result<Option<Instance>> {
        let factories = self.registry.factory_map();
        if factories.contains(&key) {
            if let Some(instance) = factories.get(&key, name) {
                trace!(key = %key, "Resolved from factory");
                return Ok(Some(instance));
            }
            trace!(key = %key, "Factory declined, falling through");
        }

        if let Some(instance) = self.registry.instance_map().get(&key, name) {
            trace!(key = %key, "Resolved from instance");
            return Ok(Some(instance));
        }

        let types = self.registry.type_map();
        if !types.contains(&key) && self.catalog.is_concrete(&key) {
            debug!(key = %key, "Implicitly self-registering concrete type");
            self.add_type(TypeRegistration::from_catalog(key, key, self.catalog)?, None)?;
        }

        let Some(mapped) = types.get_mapped_type(&key, name)? else {
            trace!(key = %key, name = ?name, "No mapping");
            return Ok(None);
        };

        path.enter(key)?;
        let built = self.construct(&mapped, arguments, path);
        path.leave();

        built.map(Some)
    }

    fn construct(
        &self,
        mapped: &MappedType,
        arguments: &[ConstructorParameter],
        path: &mut ResolutionPath,
    ) -> Result<Instance> {
        let candidate = self.select(mapped, arguments)?;
        trace!(
            concrete = %mapped.concrete(),
            index = candidate.index(),
            parameters = candidate.parameters().len(),
            "Selected constructor"
        );

        let mut values = Vec::with_capacity(candidate.parameters().len());
        for parameter in candidate.parameters() {
            if let Some(explicit) = arguments.iter().find(|a| a.name == parameter.name) {
                values.push(explicit.value.clone());
                continue;
            }

            match self.get(parameter.parameter_type, None, &[], path)? {
                Some(value) => values.push(value),
                None => {
                    return Err(self.not_found(
                        path.root(),
                        path.root_name(),
                        Some(parameter.parameter_type),
                        Some(mapped.concrete()),
                    ));
                }
            }
        }

        if !self.strategy.can_construct(candidate) {
            self.strategy
                .register(&candidate.concrete(), mapped, &self.registry)?;
        }

        let instance = self.strategy.create(candidate, &values)?;
        mapped.upcast(&instance)
    }

    /// The first candidate whose parameters are all mapped or explicitly
    /// supplied; otherwise the last candidate considered.
    fn select<'m>(
        &self,
        mapped: &'m MappedType,
        arguments: &[ConstructorParameter],
    ) -> Result<&'m ConstructorCandidate> {
        let candidates = mapped.candidates();

        candidates
            .iter()
            .find(|candidate| {
                candidate.parameters().iter().all(|p| {
                    self.registry.contains(&p.parameter_type)
                        || arguments.iter().any(|a| a.name == p.name)
                })
            })
            .or_else(|| candidates.last())
            .ok_or_else(|| TarkibError::construction(mapped.concrete(), "no constructors"))
    }

    fn not_found(
        &self,
        requested: TypeKey,
        name: Option<&str>,
        missing: Option<TypeKey>,
        required_by: Option<TypeKey>,
    ) -> TarkibError {
        let keys = self.registry.registered_keys();
        let mut available: Vec<&str> = keys.iter().map(TypeKey::type_name).collect();
        available.sort_unstable();
        available.dedup();

        let target = missing.unwrap_or(requested);
        let mut error = RegistrationNotFoundError::new(requested, name);
        error.missing = missing;
        error.required_by = required_by;
        error.suggestions =
            suggest_similar(target.type_name(), &available, self.settings.max_suggestions);

        debug!(requested = %requested, missing = ?missing, "Registration not found");
        TarkibError::RegistrationNotFound(error)
    }
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("registry", &self.registry)
            .field("strategy", &self.strategy.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProviderRegistry for TypeResolver {
    fn register_type(&self, registration: TypeRegistration, name: Option<&str>) -> Result<()> {
        self.add_type(registration, name)
    }

    fn register_instance(&self, abstraction: TypeKey, instance: Shared, name: Option<&str>) {
        self.register_instance_key(abstraction, instance, name);
    }

    fn register_factory(&self, abstraction: TypeKey, factory: Factory, name: Option<&str>) {
        self.register_factory_key(abstraction, factory, name);
    }

    fn register_generic(&self, family: GenericFamily) -> Result<()> {
        self.registry.type_map().add_generic(family)
    }
}

fn erased_factory<A>(factory: impl Fn() -> Option<Arc<A>> + Send + Sync + 'static) -> Factory
where
    A: ?Sized + Send + Sync + 'static,
{
    Arc::new(move || factory().map(erase::<A>))
}

fn cast<A: ?Sized + 'static>(key: TypeKey, instance: &Instance) -> Result<Arc<A>> {
    downcast::<A>(instance).ok_or_else(|| {
        TarkibError::construction(key, format!("resolved value is not a {}", std::any::type_name::<A>()))
    })
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{
        ConstructorParameter, ResolverBuilder, ResolverSettings, StrategyKind, TypeResolver,
    };
    pub use crate::candidate::{Arguments, Constructor, Injectable};
    pub use crate::catalog::Implements;
    pub use crate::error::{Result, TarkibError};
    pub use crate::key::TypeKey;
    pub use crate::maps::{GenericFamily, TypeRegistration};
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::strategy::ConstructionStrategy;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
