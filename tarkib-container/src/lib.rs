//! Core resolution engine for Tarkib.
//!
//! Leaves first:
//! - [`key`], [`value`]: type identities and erased values
//! - [`candidate`], [`catalog`]: constructor descriptors and the link-time
//!   type catalog
//! - [`maps`], [`registry`]: the type, instance and factory tables
//! - [`strategy`]: pluggable construction
//! - [`resolver`]: registration and resolution

pub mod candidate;
pub mod catalog;
pub mod error;
pub mod key;
pub mod maps;
mod path;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod strategy;
pub mod value;

#[doc(hidden)]
pub use inventory;

pub use resolver::prelude;
pub use error::{Result, TarkibError};
pub use key::TypeKey;
pub use resolver::{ConstructorParameter, ResolverSettings, StrategyKind, TypeResolver};
