//! Procedural macros for Tarkib.
//!
//! - `#[injectable]`: derives a constructor descriptor from an `impl` block

use proc_macro::TokenStream;

/// Injectable attribute implementation.
mod injectable;

/// Describes the public constructors of a type to the resolver.
///
/// Every `pub fn` in the block that takes no receiver and returns `Self`
/// becomes a constructor, in declaration order. Parameters taken as
/// `Arc<X>` are resolved as `X`; any other parameter `T` is resolved as `T`
/// and cloned out.
///
/// For non-generic types the descriptor is also recorded in the type
/// catalog, so the type can be resolved without prior registration.
///
/// ```ignore
/// struct UserService {
///     repo: Arc<dyn UserRepository>,
///     page_size: usize,
/// }
///
/// #[injectable]
/// impl UserService {
///     pub fn new(repo: Arc<dyn UserRepository>) -> Self {
///         Self { repo, page_size: 50 }
///     }
///
///     pub fn with_page_size(repo: Arc<dyn UserRepository>, page_size: usize) -> Self {
///         Self { repo, page_size }
///     }
/// }
/// ```
///
/// # Attributes
///
/// - `crate = "path"`: path to the tarkib crate (default `::tarkib`)
#[proc_macro_attribute]
pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    injectable::injectable(attr, item)
}
