//! Embedded on-disk key-value adapter.
//!
//! All entities live in a single sled tree. sled calls block, so every
//! operation is moved onto the blocking thread pool.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use super::{KeyValueStore, StoreResult};
use crate::core::error::StoreError;

const ENTITY_TREE: &str = "entities";

/// Durable store backed by a sled database
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) a database under `path`
    pub fn open(path: impl AsRef<Path>, cache_capacity: u64) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(cache_capacity)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        let tree = db.open_tree(ENTITY_TREE)?;

        info!(path = %path.display(), "Sled store opened");
        Ok(Self { db, tree })
    }

    /// Flush dirty buffers to disk
    pub async fn flush(&self) -> StoreResult<()> {
        let db = self.db.clone();
        run_blocking(move || db.flush().map(|_| ())).await
    }
}

async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> Result<T, sled::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {}", e)))?
        .map_err(StoreError::from)
}

fn decode_key(raw: &[u8]) -> StoreResult<String> {
    String::from_utf8(raw.to_vec())
        .map_err(|e| StoreError::Corruption(format!("non UTF-8 key: {}", e)))
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let tree = self.tree.clone();
        let key = key.to_string();
        let value = run_blocking(move || tree.get(key.as_bytes())).await?;
        Ok(value.map(|ivec| Bytes::copy_from_slice(&ivec)))
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let tree = self.tree.clone();
        let key = key.to_string();
        run_blocking(move || tree.insert(key.as_bytes(), value.as_ref()).map(|_| ())).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let tree = self.tree.clone();
        let key = key.to_string();
        let previous = run_blocking(move || tree.remove(key.as_bytes())).await?;
        Ok(previous.is_some())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let tree = self.tree.clone();
        let key = key.to_string();
        run_blocking(move || tree.contains_key(key.as_bytes())).await
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let tree = self.tree.clone();
        let prefix = prefix.to_string();
        let raw = run_blocking(move || {
            tree.scan_prefix(prefix.as_bytes())
                .keys()
                .collect::<Result<Vec<_>, _>>()
        })
        .await?;

        // sled iterates in byte order, which is already sorted
        raw.iter().map(|k| decode_key(k)).collect()
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_and_prefix_scan() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path().join("db"), 1024 * 1024).unwrap();

        store.put("plan:b", Bytes::from_static(b"2")).await.unwrap();
        store.put("plan:a", Bytes::from_static(b"1")).await.unwrap();
        store.put("service:a", Bytes::from_static(b"3")).await.unwrap();

        assert_eq!(store.get("plan:a").await.unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(
            store.list_keys("plan:").await.unwrap(),
            vec!["plan:a".to_string(), "plan:b".to_string()]
        );

        assert!(store.delete("plan:a").await.unwrap());
        assert!(!store.exists("plan:a").await.unwrap());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let store = SledStore::open(&path, 1024 * 1024).unwrap();
            store.put("plan:p", Bytes::from_static(b"{}")).await.unwrap();
            store.flush().await.unwrap();
        }

        let reopened = SledStore::open(&path, 1024 * 1024).unwrap();
        assert!(reopened.exists("plan:p").await.unwrap());
    }
}
