//! System utilities and monitoring
//!
//! This module contains Prometheus metrics and the health snapshot served on
//! `/health`.

pub mod metrics;

pub use metrics::Metrics;

use serde::{Deserialize, Serialize};

/// Health status reported by `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall service status
    pub status: ServiceStatus,
    /// Seconds since the server started
    pub uptime_secs: u64,
    /// Key-value backend in use
    pub storage_backend: String,
    /// Crate version
    pub version: String,
}

/// Service status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Serving requests normally
    Healthy,
    /// Backing store is not responding
    Unhealthy,
}
