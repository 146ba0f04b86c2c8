//! Type-erased resolved values.
//!
//! Every value that flows through the resolver is an [`Instance`]: a shared,
//! type-erased handle whose payload is an `Arc<T>`, where `T` is the type the
//! value was produced or registered as. `T` may be unsized, so a trait object
//! abstraction is stored as `Arc<dyn Trait>`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A resolved, type-erased value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erases a shared value into an [`Instance`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use tarkib_container::value::{downcast, erase};
///
/// let instance = erase(Arc::new(42u32));
/// assert_eq!(*downcast::<u32>(&instance).unwrap(), 42);
/// assert!(downcast::<i64>(&instance).is_none());
/// ```
#[inline]
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Instance {
    Arc::new(value)
}

/// Recovers the shared value stored in an [`Instance`].
///
/// Returns `None` if the instance was not erased as `T`.
#[inline]
pub fn downcast<T: ?Sized + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned()
}

/// Returns `true` if both handles point at the same erased value.
#[inline]
pub fn same_instance(a: &Instance, b: &Instance) -> bool {
    Arc::ptr_eq(a, b)
}

/// Address of the value behind a shared handle.
///
/// Two clones of one `Arc` share an address; unsized handles compare by
/// data pointer only.
#[inline]
pub fn address<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value).cast::<()>() as usize
}

/// An erased value that remembers which shared value it came from.
///
/// Instance tables compare registrations by that origin, so two `Shared`
/// built from clones of one `Arc` bind a single instance.
///
/// ```
/// use std::sync::Arc;
/// use tarkib_container::value::Shared;
///
/// let config = Arc::new(String::from("prod"));
/// let a = Shared::new(config.clone());
/// let b = Shared::new(config);
/// assert_eq!(a.identity(), b.identity());
/// ```
#[derive(Clone)]
pub struct Shared {
    instance: Instance,
    identity: usize,
}

impl Shared {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let identity = address(&value);
        Self {
            instance: erase(value),
            identity,
        }
    }

    /// The erased handle.
    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Address of the shared value this was built from.
    #[inline]
    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn into_instance(self) -> Instance {
        self.instance
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("identity", &format_args!("{:#x}", self.identity))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn trait_object_roundtrip() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = erase(greeter);

        let back = downcast::<dyn Greeter>(&instance).unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(downcast::<English>(&instance).is_none());
    }

    #[test]
    fn identity_is_pointer_identity() {
        let a = erase(Arc::new(String::from("x")));
        let b = a.clone();
        let c = erase(Arc::new(String::from("x")));

        assert!(same_instance(&a, &b));
        assert!(!same_instance(&a, &c));
    }

    #[test]
    fn address_survives_unsizing() {
        let english = Arc::new(English);
        let greeter: Arc<dyn Greeter> = english.clone();

        assert_eq!(address(&english), address(&greeter));
        assert_ne!(address(&english), address(&Arc::new(English)));
    }

    #[test]
    fn shared_keeps_origin_across_erasures() {
        let english = Arc::new(English);
        let a = Shared::new(english.clone());
        let b = Shared::new(english.clone() as Arc<dyn Greeter>);

        assert_eq!(a.identity(), b.identity());
        assert!(!same_instance(a.instance(), b.instance()));
        assert_ne!(a.identity(), Shared::new(Arc::new(English)).identity());
    }
}
