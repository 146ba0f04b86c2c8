//! Process-wide type catalog.
//!
//! The catalog is what the resolver knows about types it was never told
//! about explicitly:
//! - which types are concrete and how to build them ([`InjectableType`],
//!   submitted by `#[injectable]` or [`injectable_types!`](crate::injectable_types))
//! - which abstractions a concrete type is assignable to
//!   ([`Implementation`], submitted by [`implements!`](crate::implements))
//!
//! Entries are collected at link time with `inventory` and indexed once,
//! on first use.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::candidate::TypeDescriptor;
use crate::key::TypeKey;
use crate::value::{Instance, downcast, erase};

/// Converts an instance of a concrete type into an instance of one of its
/// abstractions. Returns `None` if the input is not of the concrete type.
pub type Upcast = fn(&Instance) -> Option<Instance>;

/// A concrete type that can be viewed as the abstraction `A`.
///
/// Every type implements itself. Implement it for trait objects with
/// [`implements!`](crate::implements), which also records the cast in
/// the catalog.
pub trait Implements<A: ?Sized + 'static>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<A>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Erased cast from `C` to `A`, usable as an [`Upcast`].
pub fn upcast<C, A>(instance: &Instance) -> Option<Instance>
where
    C: Implements<A>,
    A: ?Sized + Send + Sync + 'static,
{
    let concrete = downcast::<C>(instance)?;
    Some(erase::<A>(concrete.upcast()))
}

/// Catalog entry for a concrete injectable type.
pub struct InjectableType {
    describe: fn() -> TypeDescriptor,
}

impl InjectableType {
    pub const fn new(describe: fn() -> TypeDescriptor) -> Self {
        Self { describe }
    }
}

inventory::collect!(InjectableType);

/// Catalog entry for "concrete type is assignable to abstraction".
pub struct Implementation {
    concrete: fn() -> TypeKey,
    abstraction: fn() -> TypeKey,
    upcast: Upcast,
}

impl Implementation {
    pub const fn new(concrete: fn() -> TypeKey, abstraction: fn() -> TypeKey, upcast: Upcast) -> Self {
        Self { concrete, abstraction, upcast }
    }
}

inventory::collect!(Implementation);

/// Indexed view over all catalog entries.
pub struct Catalog {
    concretes: HashMap<TypeKey, TypeDescriptor>,
    casts: HashMap<(TypeKey, TypeKey), Upcast>,
}

static CATALOG: Lazy<Catalog> = Lazy::new(Catalog::collect);

impl Catalog {
    /// The process-wide catalog.
    pub fn global() -> &'static Catalog {
        &CATALOG
    }

    fn collect() -> Self {
        let concretes: HashMap<TypeKey, TypeDescriptor> = inventory::iter::<InjectableType>
            .into_iter()
            .map(|entry| {
                let descriptor = (entry.describe)();
                (descriptor.concrete(), descriptor)
            })
            .collect();

        let casts: HashMap<(TypeKey, TypeKey), Upcast> = inventory::iter::<Implementation>
            .into_iter()
            .map(|entry| (((entry.concrete)(), (entry.abstraction)()), entry.upcast))
            .collect();

        debug!(
            concretes = concretes.len(),
            casts = casts.len(),
            "Type catalog indexed"
        );

        Self { concretes, casts }
    }

    /// The descriptor of a concrete injectable type.
    pub fn descriptor(&self, key: &TypeKey) -> Option<&TypeDescriptor> {
        self.concretes.get(key)
    }

    /// Returns `true` if `key` is a known concrete type.
    pub fn is_concrete(&self, key: &TypeKey) -> bool {
        self.concretes.contains_key(key)
    }

    /// The cast from `concrete` to `abstraction`, identity included.
    pub fn upcast(&self, concrete: &TypeKey, abstraction: &TypeKey) -> Option<Upcast> {
        if concrete == abstraction {
            return Some(identity as Upcast);
        }
        self.casts.get(&(*concrete, *abstraction)).copied()
    }

    /// Returns `true` if a value registered as `from` can be used as `to`.
    pub fn is_assignable(&self, from: &TypeKey, to: &TypeKey) -> bool {
        from == to || self.casts.contains_key(&(*from, *to))
    }
}

fn identity(instance: &Instance) -> Option<Instance> {
    Some(instance.clone())
}

/// Declares that a concrete type implements one or more trait-object
/// abstractions.
///
/// Generates the [`Implements`] impls and records the casts in the catalog,
/// so the resolver can map the abstractions to the type and include it in
/// `resolve_all` results.
///
/// ```rust,ignore
/// trait Logger: Send + Sync { fn log(&self, msg: &str); }
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger { fn log(&self, msg: &str) { println!("{msg}"); } }
///
/// tarkib_container::implements!(ConsoleLogger => dyn Logger);
/// ```
#[macro_export]
macro_rules! implements {
    ($concrete:ty => $($abstraction:ty),+ $(,)?) => {
        $(
            impl $crate::catalog::Implements<$abstraction> for $concrete {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$abstraction> {
                    self
                }
            }

            $crate::inventory::submit! {
                $crate::catalog::Implementation::new(
                    $crate::key::TypeKey::of::<$concrete>,
                    $crate::key::TypeKey::of::<$abstraction>,
                    $crate::catalog::upcast::<$concrete, $abstraction>,
                )
            }
        )+
    };
}

/// Records hand-written [`Injectable`](crate::candidate::Injectable) types in
/// the catalog, so they can be resolved without prior registration.
#[macro_export]
macro_rules! injectable_types {
    ($($concrete:ty),+ $(,)?) => {
        $(
            $crate::inventory::submit! {
                $crate::catalog::InjectableType::new(
                    <$concrete as $crate::candidate::Injectable>::descriptor,
                )
            }
        )+
    };
}
