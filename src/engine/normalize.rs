//! Decomposition of plan documents into stored entities and back.

use crate::core::error::Result;
use crate::storage::EntityStore;
use crate::types::{
    CostShare, LinkedServiceRecord, LinkedServiceView, Plan, PlanReference, PlanView, Service,
    VersionToken, Versioned,
};

/// A single child entity write produced by [`decompose`]
#[derive(Debug, Clone, PartialEq)]
pub enum EntityWrite {
    /// Plan-level or entry-level cost share
    CostShare(CostShare),
    /// Service descriptor
    Service(Service),
    /// Linked-service entry with child ids
    LinkedService(LinkedServiceRecord),
}

impl EntityWrite {
    /// Persist this entity, returning its token
    pub async fn apply(&self, store: &EntityStore) -> Result<VersionToken> {
        match self {
            EntityWrite::CostShare(entity) => store.put(entity).await,
            EntityWrite::Service(entity) => store.put(entity).await,
            EntityWrite::LinkedService(entity) => store.put(entity).await,
        }
    }
}

/// Split a plan into its root reference and child writes.
///
/// Writes are ordered leaves first: each entry's service and cost share come
/// before the entry, and every child comes before the root is written by the
/// caller.
pub fn decompose(plan: Plan) -> (PlanReference, Vec<EntityWrite>) {
    let mut writes = Vec::with_capacity(1 + plan.linked_plan_services.len() * 3);
    let mut entry_ids = Vec::with_capacity(plan.linked_plan_services.len());

    for entry in plan.linked_plan_services {
        let record = LinkedServiceRecord {
            object_id: entry.object_id,
            object_type: entry.object_type,
            org: entry.org,
            linked_service: entry.linked_service.object_id.clone(),
            planservice_cost_shares: entry.planservice_cost_shares.object_id.clone(),
            extra: entry.extra,
        };
        entry_ids.push(record.object_id.clone());
        writes.push(EntityWrite::Service(entry.linked_service));
        writes.push(EntityWrite::CostShare(entry.planservice_cost_shares));
        writes.push(EntityWrite::LinkedService(record));
    }

    let reference = PlanReference {
        object_id: plan.object_id,
        object_type: plan.object_type,
        org: plan.org,
        plan_type: plan.plan_type,
        creation_date: plan.creation_date,
        plan_cost_shares: plan.plan_cost_shares.object_id.clone(),
        linked_plan_services: entry_ids,
        extra: plan.extra,
    };
    writes.push(EntityWrite::CostShare(plan.plan_cost_shares));

    (reference, writes)
}

/// A recomposed plan with the tokens of every descendant that was found
#[derive(Debug, Clone)]
pub struct Materialized {
    /// Nested document
    pub view: PlanView,
    /// Token of the stored reference
    pub reference_token: VersionToken,
    /// Tokens of the resolved descendants
    pub descendant_tokens: Vec<VersionToken>,
}

/// Rebuild the nested document for a stored reference.
///
/// Children that no longer exist are left out rather than failing the read.
pub async fn materialize(
    store: &EntityStore,
    reference: Versioned<PlanReference>,
) -> Result<Materialized> {
    let Versioned {
        value: reference,
        token: reference_token,
    } = reference;
    let mut tokens = Vec::new();

    let plan_cost_shares = match store.get::<CostShare>(&reference.plan_cost_shares).await? {
        Some(found) => {
            tokens.push(found.token);
            Some(found.value)
        }
        None => None,
    };

    let mut linked_plan_services = Vec::with_capacity(reference.linked_plan_services.len());
    for entry_id in &reference.linked_plan_services {
        let Some(entry) = store.get::<LinkedServiceRecord>(entry_id).await? else {
            continue;
        };
        tokens.push(entry.token);
        let record = entry.value;

        let linked_service = store.get::<Service>(&record.linked_service).await?.map(|s| {
            tokens.push(s.token);
            s.value
        });
        let planservice_cost_shares = store
            .get::<CostShare>(&record.planservice_cost_shares)
            .await?
            .map(|c| {
                tokens.push(c.token);
                c.value
            });

        linked_plan_services.push(LinkedServiceView {
            object_id: record.object_id,
            object_type: record.object_type,
            org: record.org,
            linked_service,
            planservice_cost_shares,
            extra: record.extra,
        });
    }

    let view = PlanView {
        object_id: reference.object_id,
        object_type: reference.object_type,
        org: reference.org,
        plan_type: reference.plan_type,
        creation_date: reference.creation_date,
        plan_cost_shares,
        linked_plan_services,
        extra: reference.extra,
    };

    Ok(Materialized {
        view,
        reference_token,
        descendant_tokens: tokens,
    })
}
