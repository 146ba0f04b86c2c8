//! Attribute macros for Tarkib.
//!
//! Re-exported by the `tarkib` facade; depend on that instead.

pub use tarkib_macros::injectable;
