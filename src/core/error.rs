//! Error types and handling for the plan store
//!
//! This module defines all error types used throughout the system. Every
//! engine operation returns a tagged [`Error`]; the HTTP layer maps each
//! variant onto exactly one status code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON pointer (or field name) of the offending value
    pub field: String,
    /// Human readable description of the failure
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the plan store
#[derive(Error, Debug)]
pub enum Error {
    /// Structural or referential shape violation
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Identifier collision on create
    #[error("Plan already exists: {0}")]
    Conflict(String),

    /// Mutating request without a conditional token
    #[error("Precondition required: an If-Match entity tag must be supplied")]
    PreconditionRequired,

    /// Conditional token present but stale
    #[error("Precondition failed: entity tag does not match current version of {id}")]
    PreconditionFailed {
        /// Plan whose composite token did not match
        id: String,
    },

    /// No reference entity for the given id
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or rejected caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value store adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("Backend failure: {0}")]
    Backend(String),

    /// Stored bytes could not be decoded
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Embedded database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error with a single field failure
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a conflict error
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict(id.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a backend store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(StoreError::Backend(msg.into()))
    }

    /// Short stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::PreconditionRequired => "precondition_required",
            Error::PreconditionFailed { .. } => "precondition_failed",
            Error::NotFound(_) => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::Store(_) => "store",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }

    /// Check if this is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Conflict(_)
                | Error::PreconditionRequired
                | Error::PreconditionFailed { .. }
                | Error::NotFound(_)
                | Error::Unauthorized(_)
        )
    }

    /// Check if this is a server error (5xx equivalent)
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}
