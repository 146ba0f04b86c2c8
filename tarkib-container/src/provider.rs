//! Provider trait: a module of related registrations.
//!
//! Providers group related mappings together, similar to
//! Laravel's ServiceProvider or DIshka's Provider class.
//!
//! # Examples
//! ```rust,ignore
//! struct StorageProvider;
//!
//! impl Provider for StorageProvider {
//!     fn register(&self, registry: &dyn ProviderRegistry) -> Result<()> {
//!         registry.register_type(TypeRegistration::new::<dyn Repository, SqlRepository>(), None)?;
//!         registry.register_instance(
//!             TypeKey::of::<Config>(),
//!             Shared::new(Arc::new(Config::load())),
//!             None,
//!         );
//!         Ok(())
//!     }
//! }
//!
//! resolver.add_provider(&StorageProvider)?;
//! ```

use crate::error::Result;
use crate::key::TypeKey;
use crate::maps::{Factory, GenericFamily, TypeRegistration};
use crate::value::Shared;

/// A module that registers related mappings into a resolver.
///
/// Split registrations by domain instead of one giant block:
///
/// ```rust,ignore
/// resolver.add_provider(&DatabaseProvider)?;
/// resolver.add_provider(&AuthProvider)?;
/// resolver.add_provider(&EmailProvider)?;
/// ```
pub trait Provider: Send + Sync {
    /// Registers mappings. Called once per [`add_provider`] call.
    ///
    /// [`add_provider`]: crate::resolver::TypeResolver::add_provider
    fn register(&self, registry: &dyn ProviderRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Registration surface exposed to [`Provider`] implementations.
///
/// Object-safe subset of the resolver API, so providers can be tested
/// against a mock.
pub trait ProviderRegistry {
    /// Maps an abstraction to a concrete type.
    fn register_type(&self, registration: TypeRegistration, name: Option<&str>) -> Result<()>;

    /// Binds a pre-built instance.
    fn register_instance(&self, abstraction: TypeKey, instance: Shared, name: Option<&str>);

    /// Binds a zero-argument factory.
    fn register_factory(&self, abstraction: TypeKey, factory: Factory, name: Option<&str>);

    /// Registers an open-generic family.
    fn register_generic(&self, family: GenericFamily) -> Result<()>;
}
