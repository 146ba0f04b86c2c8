//! # Tarkib
//!
//! A runtime dependency-resolution engine. Map abstractions to concrete
//! types, pre-built instances or factories, then resolve object graphs with
//! automatic constructor selection.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tarkib::prelude::*;
//! use tarkib::{implements, injectable};
//!
//! trait Greeter: Send + Sync { fn greet(&self) -> String; }
//!
//! struct English;
//!
//! #[injectable]
//! impl English {
//!     pub fn new() -> Self { English }
//! }
//!
//! impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
//! implements!(English => dyn Greeter);
//!
//! let resolver = TypeResolver::new();
//! resolver.register_type::<dyn Greeter, English>()?;
//! let greeter: Arc<dyn Greeter> = resolver.resolve()?;
//! ```

pub use tarkib_container::*;
pub use tarkib_derive::*;
pub use tarkib_support::*;
