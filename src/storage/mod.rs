//! Storage layer for the plan store
//!
//! This module provides the key-value adapter abstraction that backends
//! implement, and the namespaced [`EntityStore`] built on top of it.
//!
//! Adapters only deal in opaque string keys and byte values. Each key is
//! independent: there are no multi-key transactions, and a `put` always
//! overwrites whatever was there.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::error::StoreError;

/// Entity store over an adapter
pub mod entity_store;
/// Backend selection from configuration
pub mod factory;
/// In-memory adapter
pub mod mem_store;
/// Embedded on-disk adapter
pub mod sled_store;

pub use entity_store::EntityStore;
pub use factory::create_storage;
pub use mem_store::MemStore;
pub use sled_store::SledStore;

/// Result type for adapter calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value adapter implemented by every backend
///
/// Implementations must be linearizable per key. Failures are reported as
/// [`StoreError`] and are never retried by callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Remove `key`; returns whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check whether `key` is present
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// All keys starting with `prefix`, sorted
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Short backend name for logs and `/info`
    fn backend_name(&self) -> &'static str;
}
