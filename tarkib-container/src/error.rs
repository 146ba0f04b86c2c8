//! Error types for Tarkib resolver operations.
//!
//! Every error names the type the caller asked for and carries enough
//! metadata to find the real culprit deep inside an object graph.

use std::fmt;

use tarkib_support::rendering::render_chain;

use crate::key::TypeKey;

/// Main error type for all Tarkib operations.
#[derive(Debug, thiserror::Error)]
pub enum TarkibError {
    /// No mapping could satisfy the request, or a constructor parameter
    /// had no value.
    #[error("{}", .0)]
    RegistrationNotFound(RegistrationNotFoundError),

    /// A type mapping target cannot be constructed as the abstraction.
    #[error("{}", .0)]
    InvalidMapping(InvalidMappingError),

    /// A type was requested again while it was still being constructed.
    #[error("{}", .0)]
    CycleDetected(CycleDetectedError),

    /// A constructor or cast failed during construction.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: TypeKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The construction strategy was asked to build a type it has not
    /// prepared.
    #[error("No activator prepared for {concrete}. Register the type with the strategy before creating it")]
    NotPrepared { concrete: TypeKey },
}

impl TarkibError {
    /// Builds a [`TarkibError::ConstructionFailed`] from a message.
    pub(crate) fn construction(key: TypeKey, message: impl Into<String>) -> Self {
        TarkibError::ConstructionFailed {
            key,
            source: message.into().into(),
        }
    }
}

/// Error when a requested type could not be resolved.
///
/// `requested` is always the type the caller originally asked for. When the
/// failure sits deeper in the graph, `missing` and `required_by` point at it.
#[derive(Debug)]
pub struct RegistrationNotFoundError {
    /// The type the caller originally asked for
    pub requested: TypeKey,
    /// The binding name of the request, if any
    pub name: Option<String>,
    /// The parameter type that had no value (if the failure was transitive)
    pub missing: Option<TypeKey>,
    /// The concrete type whose constructor needed `missing`
    pub required_by: Option<TypeKey>,
    /// Similar types that ARE registered (for "did you mean?" suggestions)
    pub suggestions: Vec<String>,
}

impl RegistrationNotFoundError {
    pub(crate) fn new(requested: TypeKey, name: Option<&str>) -> Self {
        Self {
            requested,
            name: name.map(str::to_owned),
            missing: None,
            required_by: None,
            suggestions: Vec::new(),
        }
    }
}

impl fmt::Display for RegistrationNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registration not found: {}", self.requested)?;

        if let Some(ref name) = self.name {
            write!(f, " (name={name:?})")?;
        }

        if let Some(ref missing) = self.missing {
            write!(f, "\n  Missing dependency: {missing}")?;
        }

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        let hint = self.missing.as_ref().unwrap_or(&self.requested);
        write!(
            f,
            "\n  Hint: register {} or pass it as a constructor parameter",
            hint.short_name()
        )
    }
}

/// Error when a type mapping is rejected at registration time.
#[derive(Debug)]
pub struct InvalidMappingError {
    /// The abstraction being mapped
    pub abstraction: TypeKey,
    /// The rejected target
    pub concrete: TypeKey,
    /// Why the target was rejected
    pub reason: String,
}

impl fmt::Display for InvalidMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot map {} to {}: {}",
            self.abstraction, self.concrete, self.reason
        )?;
        write!(
            f,
            "\n  Hint: map to a concrete type with at least one public constructor"
        )
    }
}

/// Error when resolution re-enters a type that is still being built.
///
/// Shows the full chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CycleDetectedError {
    /// The chain of types that forms the cycle.
    /// Example: ["A", "B", "C", "A"]
    pub chain: Vec<TypeKey>,
}

impl fmt::Display for CycleDetectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency cycle detected:\n  ")?;

        let names: Vec<String> = self.chain.iter().map(TypeKey::short_name).collect();
        write!(f, "{}", render_chain(&names))?;

        write!(
            f,
            "\n  Hint: break the cycle with a factory or a constructor that takes fewer dependencies"
        )
    }
}

/// Convenient Result type for Tarkib operations.
pub type Result<T> = std::result::Result<T, TarkibError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderService;
    struct PaymentGateway;

    #[test]
    fn not_found_error_display() {
        let mut inner = RegistrationNotFoundError::new(TypeKey::of::<OrderService>(), None);
        inner.missing = Some(TypeKey::of::<PaymentGateway>());
        inner.required_by = Some(TypeKey::of::<OrderService>());

        let msg = format!("{}", TarkibError::RegistrationNotFound(inner));
        assert!(msg.contains("Registration not found"));
        assert!(msg.contains("OrderService"));
        assert!(msg.contains("Missing dependency"));
        assert!(msg.contains("register PaymentGateway"));
    }

    #[test]
    fn not_found_error_with_name() {
        let inner = RegistrationNotFoundError::new(TypeKey::of::<String>(), Some("primary"));
        let msg = format!("{}", TarkibError::RegistrationNotFound(inner));
        assert!(msg.contains("name=\"primary\""));
    }

    #[test]
    fn cycle_error_display() {
        let err = TarkibError::CycleDetected(CycleDetectedError {
            chain: vec![
                TypeKey::of::<OrderService>(),
                TypeKey::of::<PaymentGateway>(),
                TypeKey::of::<OrderService>(),
            ],
        });

        let msg = format!("{err}");
        assert!(msg.contains("cycle"));
        assert!(msg.contains("OrderService → PaymentGateway → OrderService"));
    }

    #[test]
    fn invalid_mapping_display() {
        let err = TarkibError::InvalidMapping(InvalidMappingError {
            abstraction: TypeKey::of::<PaymentGateway>(),
            concrete: TypeKey::of::<OrderService>(),
            reason: "no constructors".into(),
        });

        let msg = format!("{err}");
        assert!(msg.contains("Cannot map"));
        assert!(msg.contains("no constructors"));
    }
}
