//! Application State Management
//!
//! This module defines the central AppState that holds all application services
//! and components, and the factory that wires them from configuration.

use std::sync::Arc;
use std::time::Instant;

use crate::api::auth::{IdentityVerifier, JwtVerifier};
use crate::api::response::ApiError;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::engine::PlanEngine;
use crate::storage::{create_storage, EntityStore};
use crate::system::Metrics;
use crate::validation::SchemaValidator;

/// Central application state holding all services and components
pub struct AppState {
    /// Application configuration
    pub config: Config,

    /// Plan operations over the configured store
    pub engine: Arc<PlanEngine>,

    /// Prometheus metrics
    pub metrics: Arc<Metrics>,

    /// Bearer token verifier; `None` when auth is disabled
    pub verifier: Option<Arc<dyn IdentityVerifier>>,

    /// Server start time, for uptime reporting
    pub started_at: Instant,
}

/// Shared handle passed to every handler
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Assemble state from already constructed services
    pub fn new(
        config: Config,
        engine: Arc<PlanEngine>,
        metrics: Arc<Metrics>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
    ) -> Self {
        Self {
            config,
            engine,
            metrics,
            verifier,
            started_at: Instant::now(),
        }
    }

    /// Build every service from configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = create_storage(&config.storage)?;
        let validator = Arc::new(SchemaValidator::new()?);
        let engine = Arc::new(PlanEngine::new(EntityStore::new(backend), validator));
        let metrics = Arc::new(Metrics::new()?);

        let verifier: Option<Arc<dyn IdentityVerifier>> = if config.auth.enabled {
            Some(Arc::new(JwtVerifier::from_config(&config.auth)?))
        } else {
            None
        };

        Ok(Self::new(config, engine, metrics, verifier))
    }

    /// Wrap an error for the HTTP layer using the configured exposure policy
    pub fn reject(&self, error: Error) -> ApiError {
        ApiError::new(error, self.config.server.expose_internal_errors)
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
