//! Constructor descriptors and candidates.
//!
//! Rust has no runtime constructor reflection, so every concrete type
//! describes its public constructors explicitly through [`Injectable`]:
//! one [`Constructor`] per constructor, each with its parameter names and
//! declared types. The `#[injectable]` attribute generates this for an
//! impl block; hand-written impls are equally valid.
//!
//! A [`TypeDescriptor`] erases those constructors into
//! [`ConstructorCandidate`]s, which the resolver ranks and invokes.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use tarkib_container::candidate::{Constructor, Injectable, TypeDescriptor};
//!
//! struct Clock;
//!
//! struct Scheduler {
//!     clock: Arc<Clock>,
//!     workers: usize,
//! }
//!
//! impl Injectable for Scheduler {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![
//!             Constructor::new(|_| Ok(Scheduler { clock: Arc::new(Clock), workers: 1 })),
//!             Constructor::new(|args| {
//!                 Ok(Scheduler { clock: args.arc(0)?, workers: args.value(1)? })
//!             })
//!             .param::<Clock>("clock")
//!             .param::<usize>("workers"),
//!         ]
//!     }
//! }
//!
//! let candidates = TypeDescriptor::of::<Scheduler>().candidates();
//! assert_eq!(candidates[0].parameters().len(), 2);
//! assert_eq!(candidates[1].parameters().len(), 0);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TarkibError};
use crate::key::TypeKey;
use crate::value::{Instance, downcast, erase};

/// Invocation handle of a candidate: builds an instance from positional
/// arguments.
pub type Instantiate = Arc<dyn Fn(&Arguments<'_>) -> Result<Instance> + Send + Sync>;

type Build<C> = Arc<dyn Fn(&Arguments<'_>) -> Result<C> + Send + Sync>;

/// A concrete type that can be constructed by the resolver.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// The public constructors of this type, in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;

    /// The erased descriptor of this type.
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Self>()
    }
}

/// One constructor of `C`: a builder plus its parameter signature.
pub struct Constructor<C> {
    parameters: Vec<(TypeKey, &'static str)>,
    build: Build<C>,
}

impl<C: Send + Sync + 'static> Constructor<C> {
    /// Creates a constructor from a builder reading positional arguments.
    pub fn new(build: impl Fn(&Arguments<'_>) -> Result<C> + Send + Sync + 'static) -> Self {
        Self {
            parameters: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// Declares the next parameter.
    ///
    /// `P` is the declared type: for a parameter taken as `Arc<X>` declare
    /// `X`, for a parameter taken by value declare its own type.
    pub fn param<P: ?Sized + 'static>(mut self, name: &'static str) -> Self {
        self.parameters.push((TypeKey::of::<P>(), name));
        self
    }
}

impl<C> fmt::Debug for Constructor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// One formal parameter of a constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSummary {
    pub position: usize,
    pub parameter_type: TypeKey,
    pub name: &'static str,
}

/// One constructor of a concrete type, ready to be ranked and invoked.
#[derive(Clone)]
pub struct ConstructorCandidate {
    concrete: TypeKey,
    index: usize,
    parameters: Vec<ParameterSummary>,
    instantiate: Instantiate,
}

impl ConstructorCandidate {
    /// The concrete type this candidate builds.
    #[inline]
    pub fn concrete(&self) -> TypeKey {
        self.concrete
    }

    /// Declaration index of the constructor within its type.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Parameters in position order.
    #[inline]
    pub fn parameters(&self) -> &[ParameterSummary] {
        &self.parameters
    }

    /// The raw invocation handle.
    pub fn handle(&self) -> Instantiate {
        self.instantiate.clone()
    }

    /// Builds an instance from arguments ordered by parameter position.
    ///
    /// # Errors
    /// [`TarkibError::ConstructionFailed`] if the argument count does not
    /// match or an argument has the wrong type.
    pub fn invoke(&self, arguments: &[Instance]) -> Result<Instance> {
        if arguments.len() != self.parameters.len() {
            return Err(TarkibError::construction(
                self.concrete,
                format!(
                    "expected {} arguments, got {}",
                    self.parameters.len(),
                    arguments.len()
                ),
            ));
        }

        (self.instantiate)(&Arguments::new(self.concrete, &self.parameters, arguments))
    }
}

impl fmt::Debug for ConstructorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorCandidate")
            .field("concrete", &self.concrete)
            .field("index", &self.index)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Positional, typed access to resolved constructor arguments.
pub struct Arguments<'a> {
    concrete: TypeKey,
    parameters: &'a [ParameterSummary],
    values: &'a [Instance],
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(
        concrete: TypeKey,
        parameters: &'a [ParameterSummary],
        values: &'a [Instance],
    ) -> Self {
        Self { concrete, parameters, values }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the constructor takes no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The shared argument at `position`, declared as `T`.
    pub fn arc<T: ?Sized + 'static>(&self, position: usize) -> Result<Arc<T>> {
        let value = self.values.get(position).ok_or_else(|| {
            TarkibError::construction(self.concrete, format!("no argument at position {position}"))
        })?;

        downcast::<T>(value).ok_or_else(|| {
            let name = self
                .parameters
                .get(position)
                .map_or("?", |p| p.name);
            TarkibError::construction(
                self.concrete,
                format!(
                    "argument `{name}` at position {position} is not a {}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }

    /// A clone of the argument at `position`, declared as `T`.
    pub fn value<T: Clone + 'static>(&self, position: usize) -> Result<T> {
        self.arc::<T>(position).map(|v| (*v).clone())
    }
}

/// The erased constructor list of one concrete type.
#[derive(Clone)]
pub struct TypeDescriptor {
    concrete: TypeKey,
    constructors: Vec<ConstructorCandidate>,
}

impl TypeDescriptor {
    /// Describes an [`Injectable`] type.
    pub fn of<C: Injectable>() -> Self {
        Self::from_constructors(C::constructors())
    }

    /// Describes `C` from an explicit constructor list.
    pub fn from_constructors<C: Send + Sync + 'static>(constructors: Vec<Constructor<C>>) -> Self {
        let concrete = TypeKey::of::<C>();

        let constructors = constructors
            .into_iter()
            .enumerate()
            .map(|(index, ctor)| {
                let parameters = ctor
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(position, &(parameter_type, name))| ParameterSummary {
                        position,
                        parameter_type,
                        name,
                    })
                    .collect();

                let build = ctor.build;
                let instantiate: Instantiate =
                    Arc::new(move |args: &Arguments<'_>| Ok(erase(Arc::new(build(args)?))));

                ConstructorCandidate {
                    concrete,
                    index,
                    parameters,
                    instantiate,
                }
            })
            .collect();

        Self { concrete, constructors }
    }

    /// The described concrete type.
    #[inline]
    pub fn concrete(&self) -> TypeKey {
        self.concrete
    }

    /// Returns true if the type declares no constructor.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Candidates ranked for selection.
    pub fn candidates(&self) -> Vec<ConstructorCandidate> {
        build_candidates(self.constructors.clone())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("concrete", &self.concrete)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Ranks candidates: most parameters first, declaration order among equals.
///
/// The most dependency-rich constructor is the most fully wired choice;
/// the others stay as fallbacks for selection.
pub fn build_candidates(mut candidates: Vec<ConstructorCandidate>) -> Vec<ConstructorCandidate> {
    // stable: equal counts keep declaration order
    candidates.sort_by(|a, b| b.parameters.len().cmp(&a.parameters.len()));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[derive(Debug)]
    struct Mailer {
        host: String,
        port: u16,
    }

    impl Injectable for Mailer {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![
                Constructor::new(|_| Ok(Mailer { host: "localhost".into(), port: 25 })),
                Constructor::new(|args| Ok(Mailer { host: args.value(0)?, port: 25 }))
                    .param::<String>("host"),
                Constructor::new(|args| {
                    Ok(Mailer { host: args.value(0)?, port: args.value(1)? })
                })
                .param::<String>("host")
                .param::<u16>("port"),
                Constructor::new(|args| {
                    let _clock: Arc<Clock> = args.arc(1)?;
                    Ok(Mailer { host: args.value(0)?, port: 587 })
                })
                .param::<String>("host")
                .param::<Clock>("clock"),
            ]
        }
    }

    #[test]
    fn candidates_sorted_by_parameter_count() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        let counts: Vec<usize> = candidates.iter().map(|c| c.parameters().len()).collect();

        assert_eq!(counts, vec![2, 2, 1, 0]);
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn equal_counts_keep_declaration_order() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        assert_eq!(candidates[0].index(), 2);
        assert_eq!(candidates[1].index(), 3);
    }

    #[test]
    fn parameter_summaries_carry_position_type_and_name() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        let params = candidates[1].parameters();

        assert_eq!(params[0].position, 0);
        assert_eq!(params[0].name, "host");
        assert!(params[0].parameter_type.is::<String>());
        assert_eq!(params[1].position, 1);
        assert!(params[1].parameter_type.is::<Clock>());
    }

    #[test]
    fn invoke_builds_instance() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        let args = vec![
            erase(Arc::new(String::from("smtp.example.com"))),
            erase(Arc::new(2525u16)),
        ];

        let instance = candidates[0].invoke(&args).unwrap();
        let mailer = downcast::<Mailer>(&instance).unwrap();
        assert_eq!(mailer.host, "smtp.example.com");
        assert_eq!(mailer.port, 2525);
    }

    #[test]
    fn invoke_rejects_wrong_argument_count() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        let err = candidates[0].invoke(&[]).unwrap_err();
        assert!(matches!(err, TarkibError::ConstructionFailed { .. }));
    }

    #[test]
    fn invoke_rejects_wrong_argument_type() {
        let candidates = TypeDescriptor::of::<Mailer>().candidates();
        let args = vec![erase(Arc::new(1u8)), erase(Arc::new(2525u16))];

        let err = candidates[0].invoke(&args).unwrap_err();
        assert!(err.to_string().contains("`host`"));
    }

    #[test]
    fn empty_descriptor() {
        let descriptor = TypeDescriptor::from_constructors::<Clock>(vec![]);
        assert!(descriptor.is_empty());
        assert!(descriptor.concrete().is::<Clock>());
    }
}
