//! Collection of child entities no plan refers to any more.
//!
//! Deleting a plan only removes its root reference, and replacing or
//! patching a plan can leave superseded children behind. This pass finds
//! every child reachable from a stored plan and removes the rest.
//!
//! The pass reads and deletes without coordination with writers. A plan
//! whose children are written while the pass runs, but whose reference is
//! not yet stored, can lose those children.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::PlanEngine;
use crate::core::error::Result;
use crate::types::{EntityKind, LinkedServiceRecord, PlanReference};

/// Deleted entity counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Cost shares removed
    pub cost_shares: usize,
    /// Linked-service entries removed
    pub linked_services: usize,
    /// Service descriptors removed
    pub services: usize,
}

impl OrphanReport {
    /// Total entities removed
    pub fn total(&self) -> usize {
        self.cost_shares + self.linked_services + self.services
    }
}

#[derive(Default)]
struct Reachable {
    cost_shares: HashSet<String>,
    linked_services: HashSet<String>,
    services: HashSet<String>,
}

impl Reachable {
    fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::CostShare => self.cost_shares.contains(id),
            EntityKind::LinkedService => self.linked_services.contains(id),
            EntityKind::Service => self.services.contains(id),
            EntityKind::Plan => true,
        }
    }
}

impl PlanEngine {
    /// Delete every child entity not reachable from a stored plan
    pub async fn collect_orphans(&self) -> Result<OrphanReport> {
        let store = self.store();
        let mut reachable = Reachable::default();

        for plan_id in store.list_ids(EntityKind::Plan).await? {
            let Some(reference) = store.get::<PlanReference>(&plan_id).await? else {
                continue;
            };
            let reference = reference.value;
            reachable.cost_shares.insert(reference.plan_cost_shares);

            for entry_id in reference.linked_plan_services {
                if let Some(entry) = store.get::<LinkedServiceRecord>(&entry_id).await? {
                    reachable.services.insert(entry.value.linked_service);
                    reachable.cost_shares.insert(entry.value.planservice_cost_shares);
                }
                reachable.linked_services.insert(entry_id);
            }
        }

        let mut report = OrphanReport::default();
        for kind in [EntityKind::LinkedService, EntityKind::Service, EntityKind::CostShare] {
            for id in store.list_ids(kind).await? {
                if reachable.contains(kind, &id) || !store.delete(kind, &id).await? {
                    continue;
                }
                match kind {
                    EntityKind::CostShare => report.cost_shares += 1,
                    EntityKind::LinkedService => report.linked_services += 1,
                    EntityKind::Service => report.services += 1,
                    EntityKind::Plan => {}
                }
            }
        }

        info!(
            cost_shares = report.cost_shares,
            linked_services = report.linked_services,
            services = report.services,
            "Orphan collection finished"
        );
        Ok(report)
    }
}

/// Run orphan collection every `interval` on the current runtime
pub fn spawn_orphan_collector(engine: Arc<PlanEngine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = engine.collect_orphans().await {
                warn!(error = %e, "Scheduled orphan collection failed");
            }
        }
    })
}
