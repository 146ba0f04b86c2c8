//! The chain of types currently under construction.
//!
//! One path lives for the duration of one top-level resolution call and is
//! threaded through every recursive parameter resolution. It serves two
//! purposes: it names the originally requested type in not-found errors,
//! and it detects re-entry into a type that is still being built.

use tracing::warn;

use crate::error::{CycleDetectedError, TarkibError};
use crate::key::TypeKey;

/// Stack of types being resolved, outermost first.
#[derive(Debug)]
pub(crate) struct ResolutionPath {
    requested: TypeKey,
    name: Option<String>,
    building: Vec<TypeKey>,
    detect_cycles: bool,
}

impl ResolutionPath {
    /// Starts a path for a top-level request of `requested`.
    pub fn new(requested: TypeKey, name: Option<&str>, detect_cycles: bool) -> Self {
        Self {
            requested,
            name: name.map(str::to_owned),
            building: Vec::new(),
            detect_cycles,
        }
    }

    /// The type the caller originally asked for.
    pub fn root(&self) -> TypeKey {
        self.requested
    }

    /// The binding name of the original request.
    pub fn root_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Marks `key` as under construction.
    ///
    /// # Errors
    /// [`TarkibError::CycleDetected`] if `key` is already being built and
    /// cycle detection is on. The chain runs from the first occurrence of
    /// `key` back to `key`.
    pub fn enter(&mut self, key: TypeKey) -> Result<(), TarkibError> {
        if self.detect_cycles {
            if let Some(start) = self.building.iter().position(|k| *k == key) {
                let mut chain = self.building[start..].to_vec();
                chain.push(key);

                warn!(cycle = ?chain, "Dependency cycle detected");
                return Err(TarkibError::CycleDetected(CycleDetectedError { chain }));
            }
        }

        self.building.push(key);
        Ok(())
    }

    /// Marks the innermost type as finished.
    pub fn leave(&mut self) {
        self.building.pop();
    }

    /// Current nesting depth.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.building.len()
    }
}
