//! Construction strategies.
//!
//! A strategy turns a selected [`ConstructorCandidate`] plus its resolved
//! arguments into an instance. The resolver picks one strategy when it is
//! built and never switches per call.
//!
//! - [`ReflectiveStrategy`]: invokes the candidate's handle directly. Needs
//!   no preparation.
//! - [`CompiledStrategy`]: prepares one [`Activator`] per constructor ahead
//!   of time and reuses it for every later construction.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::candidate::{Arguments, ConstructorCandidate, Instantiate, ParameterSummary};
use crate::error::{Result, TarkibError};
use crate::key::TypeKey;
use crate::maps::MappedType;
use crate::registry::ResolutionRegistry;
use crate::value::Instance;

/// Turns a candidate and positional arguments into an instance.
///
/// Implementations must be thread-safe; the resolver shares one strategy
/// across all callers.
pub trait ConstructionStrategy: Send + Sync {
    /// Returns `true` if the strategy can build `candidate` right now.
    fn can_construct(&self, candidate: &ConstructorCandidate) -> bool;

    /// Prepares the strategy to build `concrete`.
    ///
    /// Idempotent: preparing an already prepared type returns immediately.
    fn register(
        &self,
        concrete: &TypeKey,
        mapped: &MappedType,
        registry: &ResolutionRegistry,
    ) -> Result<()>;

    /// Builds an instance from arguments ordered by parameter position.
    fn create(&self, candidate: &ConstructorCandidate, arguments: &[Instance]) -> Result<Instance>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════
// Reflective
// ═══════════════════════════════════════════

/// Builds every instance through the candidate's own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectiveStrategy;

impl ConstructionStrategy for ReflectiveStrategy {
    fn can_construct(&self, _candidate: &ConstructorCandidate) -> bool {
        true
    }

    fn register(&self, _: &TypeKey, _: &MappedType, _: &ResolutionRegistry) -> Result<()> {
        Ok(())
    }

    fn create(&self, candidate: &ConstructorCandidate, arguments: &[Instance]) -> Result<Instance> {
        candidate.invoke(arguments)
    }

    fn name(&self) -> &'static str {
        "reflective"
    }
}

// ═══════════════════════════════════════════
// Compiled
// ═══════════════════════════════════════════

/// A prepared builder for one constructor.
///
/// Arity and parameter metadata are fixed when the activator is built, so
/// construction is a length check and one call.
#[derive(Clone)]
pub struct Activator {
    concrete: TypeKey,
    parameters: Arc<[ParameterSummary]>,
    instantiate: Instantiate,
}

impl Activator {
    fn prepare(candidate: &ConstructorCandidate) -> Self {
        Self {
            concrete: candidate.concrete(),
            parameters: candidate.parameters().into(),
            instantiate: candidate.handle(),
        }
    }

    /// Number of arguments the constructor takes.
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Runs the constructor.
    pub fn instantiate(&self, arguments: &[Instance]) -> Result<Instance> {
        if arguments.len() != self.arity() {
            return Err(TarkibError::construction(
                self.concrete,
                format!("expected {} arguments, got {}", self.arity(), arguments.len()),
            ));
        }

        (self.instantiate)(&Arguments::new(self.concrete, &self.parameters, arguments))
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("concrete", &self.concrete)
            .field("arity", &self.arity())
            .finish()
    }
}

/// Caches one [`Activator`] per (concrete type, constructor index).
///
/// Preparing a type also prepares every other type mapped under the same
/// abstraction. The cache only grows.
#[derive(Default)]
pub struct CompiledStrategy {
    activators: DashMap<(TypeKey, usize), Activator>,
}

impl CompiledStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prepared activators.
    pub fn prepared(&self) -> usize {
        self.activators.len()
    }

    fn prepare_all(&self, mapped: &MappedType) -> usize {
        let mut prepared = 0;
        for candidate in mapped.candidates() {
            let slot = (candidate.concrete(), candidate.index());
            if self.activators.contains_key(&slot) {
                continue;
            }
            self.activators
                .entry(slot)
                .or_insert_with(|| Activator::prepare(candidate));
            prepared += 1;
        }
        prepared
    }
}

impl ConstructionStrategy for CompiledStrategy {
    fn can_construct(&self, candidate: &ConstructorCandidate) -> bool {
        self.activators
            .contains_key(&(candidate.concrete(), candidate.index()))
    }

    fn register(
        &self,
        concrete: &TypeKey,
        mapped: &MappedType,
        registry: &ResolutionRegistry,
    ) -> Result<()> {
        let ready = mapped
            .candidates()
            .iter()
            .all(|c| self.activators.contains_key(&(*concrete, c.index())));
        if ready {
            return Ok(());
        }

        let mut prepared = self.prepare_all(mapped);
        for sibling in registry.type_map().mapped_types(&mapped.abstraction()) {
            prepared += self.prepare_all(&sibling);
        }

        debug!(
            concrete = %concrete,
            abstraction = %mapped.abstraction(),
            prepared,
            "Prepared activators"
        );
        Ok(())
    }

    fn create(&self, candidate: &ConstructorCandidate, arguments: &[Instance]) -> Result<Instance> {
        // clone out so the shard lock is released before user code runs
        let activator = self
            .activators
            .get(&(candidate.concrete(), candidate.index()))
            .map(|entry| entry.value().clone())
            .ok_or(TarkibError::NotPrepared {
                concrete: candidate.concrete(),
            })?;

        trace!(concrete = %candidate.concrete(), index = candidate.index(), "Activating");
        activator.instantiate(arguments)
    }

    fn name(&self) -> &'static str {
        "compiled"
    }
}

impl fmt::Debug for CompiledStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStrategy")
            .field("activators", &self.activators.len())
            .finish()
    }
}
