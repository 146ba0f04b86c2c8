//! # Tarkib Support
//!
//! Shared utilities for the Tarkib resolution engine.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Type-name helpers shared between tarkib crates

pub mod rendering;
