//! Domain types for the plan store
//!
//! This module contains the plan document model in its wire, stored and
//! materialized shapes, together with version tokens and entity tags.

/// Plan document model
pub mod plan;
/// Version tokens and HTTP entity tags
pub mod version;

pub use plan::{
    CostShare, Entity, EntityKind, ExtraFields, LinkedService, LinkedServiceRecord,
    LinkedServiceView, Plan, PlanReference, PlanView, Service,
};
pub use version::{Conditional, ETag, VersionToken};

/// Authenticated caller attached to each request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Subject claim of the verified token
    pub subject: String,
}

impl Principal {
    /// Caller used when identity verification is disabled
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
        }
    }
}

/// An entity paired with the token of its current stored content
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Decoded entity
    pub value: T,
    /// Token over the stored canonical encoding
    pub token: VersionToken,
}
