//! planstore - conditional-write REST API for hierarchical plan documents
//!
//! A plan document is split into independently stored entities (the plan
//! reference, cost shares, linked-service entries and service descriptors).
//! Reads recompose the nested document and report a composite entity tag
//! that changes whenever the plan or any of its descendants changes. Every
//! mutation must present the current tag.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;
pub mod types;

// Main functional modules
pub mod api;
pub mod engine;
pub mod patch;
pub mod storage;
pub mod system;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
