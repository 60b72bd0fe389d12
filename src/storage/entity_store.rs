//! Namespaced entity persistence
//!
//! [`EntityStore`] maps an `(EntityKind, id)` pair onto the adapter key
//! `"{namespace}:{id}"` and computes a content version token for every entity
//! it writes or reads. Tokens are derived from the stored bytes, so a read
//! always reports the token of exactly what is on disk.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::trace;

use super::KeyValueStore;
use crate::core::error::{Error, Result, StoreError};
use crate::types::{Entity, EntityKind, VersionToken, Versioned};

/// Typed, namespaced view over a key-value adapter
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn KeyValueStore>,
}

impl EntityStore {
    /// Wrap an adapter
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Storage key for an entity
    pub fn key(kind: EntityKind, id: &str) -> String {
        format!("{}:{}", kind.namespace(), id)
    }

    fn checked_key(kind: EntityKind, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(Error::invalid_field(
                "/objectId",
                format!("{} id must not be empty", kind),
            ));
        }
        Ok(Self::key(kind, id))
    }

    /// Write an entity, overwriting any previous version
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<VersionToken> {
        let key = Self::checked_key(E::KIND, entity.id())?;
        let value = serde_json::to_value(entity)?;
        let token = VersionToken::of_value(&value);
        let bytes = serde_json::to_vec(&value)?;

        self.backend.put(&key, Bytes::from(bytes)).await?;
        trace!(key = %key, token = %token, "Entity written");
        Ok(token)
    }

    /// Read an entity with its current token
    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<Versioned<E>>> {
        let key = Self::checked_key(E::KIND, id)?;
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corruption(format!("{}: {}", key, e)))?;
        let token = VersionToken::of_value(&value);
        let entity = serde_json::from_value(value)
            .map_err(|e| StoreError::Corruption(format!("{}: {}", key, e)))?;

        Ok(Some(Versioned { value: entity, token }))
    }

    /// Check presence without decoding
    pub async fn exists(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let key = Self::checked_key(kind, id)?;
        Ok(self.backend.exists(&key).await?)
    }

    /// Remove an entity; returns whether it existed
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let key = Self::checked_key(kind, id)?;
        Ok(self.backend.delete(&key).await?)
    }

    /// Ids stored under a namespace, sorted
    pub async fn list_ids(&self, kind: EntityKind) -> Result<Vec<String>> {
        let prefix = format!("{}:", kind.namespace());
        let keys = self.backend.list_keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}
