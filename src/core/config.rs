//! Configuration management for the plan store
//!
//! Settings are resolved in three layers: built-in defaults, an optional TOML
//! file, then `PLANSTORE_*` environment variables. The result is validated
//! before use.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default configuration file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "planstore.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PLANSTORE_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Caller identity verification
    pub auth: AuthConfig,

    /// Orphaned child collection
    pub gc: GcConfig,

    /// Performance tuning
    pub performance: PerformanceConfig,

    /// Metrics and monitoring
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Attach a permissive CORS layer
    pub enable_cors: bool,

    /// Include internal store diagnostics in 5xx response bodies
    pub expose_internal_errors: bool,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
}

/// Available key-value backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory DashMap store, lost on restart
    Memory,
    /// Embedded sled database under `data_dir`
    Disk,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,

    /// Data directory path (disk backend only)
    pub data_dir: PathBuf,

    /// Page cache capacity in bytes (disk backend only)
    pub cache_capacity: u64,
}

/// Bearer token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a verified bearer token on plan routes
    pub enabled: bool,

    /// Expected `iss` claim
    pub issuer: String,

    /// Expected `aud` claim
    pub audience: String,

    /// HS256 shared secret
    pub secret: Option<String>,
}

/// Orphan collection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Seconds between background collection passes (0 = never)
    ///
    /// Warning: passes do not coordinate with writers and can delete children
    /// of a plan whose create or replace is still in flight.
    pub interval_secs: u64,
}

/// Performance tuning configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Number of worker threads (0 = auto-detect)
    pub worker_threads: usize,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on `/metrics`
    pub enabled: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable multi-field lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: true,
            expose_internal_errors: false,
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            data_dir: PathBuf::from("./data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: "planstore".to_string(),
            audience: "planstore-api".to_string(),
            secret: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from an optional file and the process environment.
    ///
    /// With no explicit path, `planstore.toml` in the working directory is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Config::default(),
        };

        config.apply_overrides(std::env::vars())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `PLANSTORE_*` overrides from a list of environment pairs
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "HTTP_ADDR" => {
                    self.server.http_addr = value
                        .parse()
                        .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
                }
                "EXPOSE_INTERNAL_ERRORS" => {
                    self.server.expose_internal_errors = parse_bool(name, &value)?;
                }
                "STORAGE_TYPE" => self.storage.storage_type = parse_storage_type(&value)?,
                "DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
                "AUTH_ENABLED" => self.auth.enabled = parse_bool(name, &value)?,
                "AUTH_ISSUER" => self.auth.issuer = value,
                "AUTH_AUDIENCE" => self.auth.audience = value,
                "AUTH_SECRET" => self.auth.secret = Some(value),
                "GC_INTERVAL_SECS" => {
                    self.gc.interval_secs = value
                        .parse()
                        .map_err(|e| Error::config(format!("Invalid GC interval: {}", e)))?;
                }
                "WORKER_THREADS" => {
                    self.performance.worker_threads = value
                        .parse()
                        .map_err(|e| Error::config(format!("Invalid worker threads: {}", e)))?;
                }
                "METRICS_ENABLED" => self.metrics.enabled = parse_bool(name, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_FORMAT" => {
                    self.logging.format = match value.as_str() {
                        "json" => LogFormat::Json,
                        "pretty" => LogFormat::Pretty,
                        other => {
                            return Err(Error::config(format!("Invalid log format: {}", other)))
                        }
                    };
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        if self.performance.worker_threads > 1024 {
            return Err(Error::config("Too many worker threads (maximum 1024)"));
        }

        if self.server.max_body_bytes == 0 {
            return Err(Error::config("max_body_bytes must be positive"));
        }

        if self.storage.storage_type == StorageType::Disk
            && self.storage.data_dir.as_os_str().is_empty()
        {
            return Err(Error::config("Disk storage requires a data directory"));
        }

        if self.auth.enabled {
            match &self.auth.secret {
                Some(secret) if !secret.is_empty() => {}
                _ => return Err(Error::config("Auth is enabled but no secret is configured")),
            }
        }

        Ok(())
    }

    /// Get optimal number of worker threads
    pub fn optimal_worker_threads(&self) -> usize {
        if self.performance.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.performance.worker_threads
        }
    }
}

/// Parse a storage backend name
pub fn parse_storage_type(value: &str) -> Result<StorageType> {
    match value {
        "memory" => Ok(StorageType::Memory),
        "disk" => Ok(StorageType::Disk),
        other => Err(Error::config(format!(
            "Invalid storage type: {}. Valid options: memory, disk",
            other
        ))),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(Error::config(format!("Invalid boolean for {}: {}", name, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.storage_type, StorageType::Memory);
        assert!(!config.auth.enabled);
        assert!(config.optimal_worker_threads() >= 1);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(vars(&[
                ("PLANSTORE_HTTP_ADDR", "127.0.0.1:9000"),
                ("PLANSTORE_STORAGE_TYPE", "disk"),
                ("PLANSTORE_LOG_FORMAT", "json"),
                ("PLANSTORE_GC_INTERVAL_SECS", "60"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.storage.storage_type, StorageType::Disk);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.gc.interval_secs, 60);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(vars(&[("PLANSTORE_STORAGE_TYPE", "distributed")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_auth_requires_secret() {
        let mut config = Config::default();
        config.auth.enabled = true;
        assert!(config.validate().is_err());

        config.auth.secret = Some("s3cret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nhttp_addr = \"127.0.0.1:7070\"\n\n[storage]\nstorage_type = \"disk\"\ndata_dir = \"/tmp/plans\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.http_addr.port(), 7070);
        assert_eq!(config.storage.storage_type, StorageType::Disk);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/plans"));
        assert_eq!(config.logging.level, "info");
        assert!(config.metrics.enabled);
    }
}
