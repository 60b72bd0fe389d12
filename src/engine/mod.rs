//! Normalization and composite-ETag engine
//!
//! The engine owns the five plan operations. It splits incoming documents
//! into independently stored entities, recomposes them on read, and guards
//! every mutation with the plan's composite entity tag.
//!
//! Writes are not atomic as a group. Children are written leaves first and
//! the root reference last, so a failure part way through leaves the
//! previously stored reference (and therefore the previous composite tag)
//! in place.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::core::error::{Error, Result};
use crate::storage::EntityStore;
use crate::types::{
    Conditional, ETag, EntityKind, Plan, PlanReference, PlanView, Principal, Versioned,
};
use crate::validation::PlanValidator;

/// Composite tags and precondition checks
pub mod etag;
/// Decompose and materialize
pub mod normalize;
/// Orphaned child collection
pub mod orphans;
/// Plan-level merge patch
pub mod plan_patch;

pub use etag::composite_etag;
pub use normalize::{decompose, materialize, EntityWrite, Materialized};
pub use orphans::{spawn_orphan_collector, OrphanReport};
pub use plan_patch::apply_plan_patch;

/// A stored plan as returned to callers
#[derive(Debug, Clone)]
pub struct Stored {
    /// Composite tag of the stored plan
    pub etag: ETag,
    /// Materialized document
    pub document: PlanView,
}

/// Result of a conditional read
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// Current document
    Found(Stored),
    /// `If-None-Match` matched the current tag
    NotModified {
        /// Current composite tag
        etag: ETag,
    },
}

/// Plan operations over an entity store
pub struct PlanEngine {
    store: EntityStore,
    validator: Arc<dyn PlanValidator>,
}

impl PlanEngine {
    /// Create an engine over a store and validator
    pub fn new(store: EntityStore, validator: Arc<dyn PlanValidator>) -> Self {
        Self { store, validator }
    }

    /// Underlying entity store
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Store a new plan. Fails with `Conflict` when the id is taken.
    pub async fn create_plan(&self, document: Value, principal: &Principal) -> Result<Stored> {
        // Collision is reported ahead of validation whenever an id can be read
        if let Some(id) = document.get("objectId").and_then(Value::as_str) {
            if !id.is_empty() && self.store.exists(EntityKind::Plan, id).await? {
                return Err(Error::conflict(id));
            }
        }

        let plan = self.validated_plan(&document)?;
        let id = plan.object_id.clone();
        if self.store.exists(EntityKind::Plan, &id).await? {
            return Err(Error::conflict(id));
        }

        let stored = self.write(plan).await?;
        info!(plan_id = %id, subject = %principal.subject, etag = %stored.etag, "Plan created");
        Ok(stored)
    }

    /// Read a plan, honouring `If-None-Match`
    pub async fn get_plan(
        &self,
        id: &str,
        if_none_match: Option<&Conditional>,
    ) -> Result<ReadOutcome> {
        let current = self.load(id).await?;
        let etag = current.etag();

        if let Some(condition) = if_none_match {
            if condition.matches_weak(&etag) {
                debug!(plan_id = %id, "Plan not modified");
                return Ok(ReadOutcome::NotModified { etag });
            }
        }

        Ok(ReadOutcome::Found(Stored {
            etag,
            document: current.view,
        }))
    }

    /// Replace a plan wholesale
    pub async fn replace_plan(
        &self,
        id: &str,
        document: Value,
        if_match: Option<&Conditional>,
        principal: &Principal,
    ) -> Result<Stored> {
        let supplied = etag::require_if_match(if_match)?;
        let current = self.load(id).await?;
        etag::check_if_match(id, supplied, &current.etag())?;

        let plan = self.validated_plan(&document)?;
        if plan.object_id != id {
            return Err(Error::invalid_field(
                "/objectId",
                format!("body id '{}' does not match path id '{}'", plan.object_id, id),
            ));
        }

        let stored = self.write(plan).await?;
        info!(plan_id = %id, subject = %principal.subject, etag = %stored.etag, "Plan replaced");
        Ok(stored)
    }

    /// Apply a merge patch to a plan
    pub async fn patch_plan(
        &self,
        id: &str,
        patch: Value,
        if_match: Option<&Conditional>,
        principal: &Principal,
    ) -> Result<Stored> {
        let supplied = etag::require_if_match(if_match)?;
        let current = self.load(id).await?;
        etag::check_if_match(id, supplied, &current.etag())?;

        let current_doc = serde_json::to_value(&current.view)?;
        let next = apply_plan_patch(&current_doc, &patch)?;
        let plan = self.validated_plan(&next)?;

        let stored = self.write(plan).await?;
        info!(plan_id = %id, subject = %principal.subject, etag = %stored.etag, "Plan patched");
        Ok(stored)
    }

    /// Delete a plan's root reference. Children are left for orphan collection.
    pub async fn delete_plan(
        &self,
        id: &str,
        if_match: Option<&Conditional>,
        principal: &Principal,
    ) -> Result<()> {
        let supplied = etag::require_if_match(if_match)?;
        let current = self.load(id).await?;
        etag::check_if_match(id, supplied, &current.etag())?;

        if !self.store.delete(EntityKind::Plan, id).await? {
            return Err(Error::not_found(id));
        }
        info!(plan_id = %id, subject = %principal.subject, "Plan deleted");
        Ok(())
    }

    /// Ids of every stored plan, sorted
    pub async fn list_plans(&self) -> Result<Vec<String>> {
        self.store.list_ids(EntityKind::Plan).await
    }

    async fn load(&self, id: &str) -> Result<Materialized> {
        if id.is_empty() {
            return Err(Error::not_found(id));
        }
        let reference = self
            .store
            .get::<PlanReference>(id)
            .await?
            .ok_or_else(|| Error::not_found(id))?;
        materialize(&self.store, reference).await
    }

    fn validated_plan(&self, document: &Value) -> Result<Plan> {
        self.validator.validate(document).into_result()?;
        serde_json::from_value(document.clone())
            .map_err(|e| Error::invalid_field("/", e.to_string()))
    }

    async fn write(&self, plan: Plan) -> Result<Stored> {
        let (reference, writes) = decompose(plan);
        for write in &writes {
            write.apply(&self.store).await?;
        }
        let token = self.store.put(&reference).await?;

        let materialized = materialize(&self.store, Versioned { value: reference, token }).await?;
        Ok(Stored {
            etag: materialized.etag(),
            document: materialized.view,
        })
    }
}

#[cfg(test)]
mod tests;
