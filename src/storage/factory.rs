//! Storage factory for creating adapters based on configuration

use std::sync::Arc;

use tracing::info;

use super::{KeyValueStore, MemStore, SledStore};
use crate::core::config::{StorageConfig, StorageType};
use crate::core::error::Result;

/// Create the configured key-value adapter
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.storage_type {
        StorageType::Memory => Arc::new(MemStore::new()),
        StorageType::Disk => {
            std::fs::create_dir_all(&config.data_dir)?;
            Arc::new(SledStore::open(
                config.data_dir.join("planstore.sled"),
                config.cache_capacity,
            )?)
        }
    };

    info!(backend = store.backend_name(), "Storage initialized");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_creation() {
        let config = StorageConfig {
            storage_type: StorageType::Memory,
            ..Default::default()
        };

        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }

    #[test]
    fn test_disk_storage_creates_data_dir() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            storage_type: StorageType::Disk,
            data_dir: dir.path().join("nested"),
            ..Default::default()
        };

        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_name(), "sled");
        assert!(dir.path().join("nested").exists());
    }
}
