//! Plan document model
//!
//! Two shapes exist for every entity kind. The wire shape is the nested,
//! denormalized document clients send and receive. The stored shape replaces
//! nested children with their identifiers. Unknown fields are carried in a
//! flattened `extra` map so documents survive a round trip unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Fields not modelled explicitly, preserved verbatim
pub type ExtraFields = Map<String, Value>;

/// The four independently stored entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Root plan reference
    Plan,
    /// Deductible / copay pair
    CostShare,
    /// Linked plan service entry
    LinkedService,
    /// Billable service descriptor
    Service,
}

impl EntityKind {
    /// All kinds, children after the plan
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Plan,
        EntityKind::CostShare,
        EntityKind::LinkedService,
        EntityKind::Service,
    ];

    /// Storage namespace for this kind
    pub fn namespace(&self) -> &'static str {
        match self {
            EntityKind::Plan => "plan",
            EntityKind::CostShare => "membercostshare",
            EntityKind::LinkedService => "planservice",
            EntityKind::Service => "service",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.namespace())
    }
}

/// A value that can be persisted in the entity store
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Namespace this entity is stored under
    const KIND: EntityKind;

    /// Returns the unique identifier for this entity
    fn id(&self) -> &str;
}

/// Deductible / copay pair, attachable at plan or linked-service level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostShare {
    /// Identifier
    pub object_id: String,
    /// Type tag, `membercostshare`
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Deductible amount
    pub deductible: Number,
    /// Copay amount
    pub copay: Number,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Name / organisation metadata for a billable service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Identifier
    pub object_id: String,
    /// Type tag, `service`
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Display name
    pub name: String,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Linked plan service as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedService {
    /// Identifier
    pub object_id: String,
    /// Type tag, `planservice`
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Nested service descriptor
    pub linked_service: Service,
    /// Cost share specific to this service
    pub planservice_cost_shares: CostShare,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Full plan document as accepted on create, replace and after patching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Identifier
    pub object_id: String,
    /// Type tag, `plan`
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Plan type, e.g. `inNetwork`
    pub plan_type: String,
    /// Creation date as supplied by the caller
    pub creation_date: String,
    /// Plan-level cost share
    pub plan_cost_shares: CostShare,
    /// Ordered linked services
    pub linked_plan_services: Vec<LinkedService>,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Stored root: scalar plan fields plus child identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReference {
    /// Identifier
    pub object_id: String,
    /// Type tag
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Plan type
    pub plan_type: String,
    /// Creation date
    pub creation_date: String,
    /// Id of the plan-level cost share
    pub plan_cost_shares: String,
    /// Ids of linked service entries, in document order
    pub linked_plan_services: Vec<String>,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Stored linked service entry, children replaced by ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedServiceRecord {
    /// Identifier
    pub object_id: String,
    /// Type tag
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Id of the service descriptor
    pub linked_service: String,
    /// Id of the entry's cost share
    pub planservice_cost_shares: String,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Linked service as materialized on read; children may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedServiceView {
    /// Identifier
    pub object_id: String,
    /// Type tag
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Nested service descriptor, if it still exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_service: Option<Service>,
    /// Entry cost share, if it still exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planservice_cost_shares: Option<CostShare>,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Plan as materialized on read; dangling children are omitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    /// Identifier
    pub object_id: String,
    /// Type tag
    pub object_type: String,
    /// Owning organisation
    #[serde(rename = "_org")]
    pub org: String,
    /// Plan type
    pub plan_type: String,
    /// Creation date
    pub creation_date: String,
    /// Plan-level cost share, if it still exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_cost_shares: Option<CostShare>,
    /// Linked services that still exist, in reference order
    #[serde(default)]
    pub linked_plan_services: Vec<LinkedServiceView>,
    /// Unmodelled fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Entity for PlanReference {
    const KIND: EntityKind = EntityKind::Plan;
    fn id(&self) -> &str {
        &self.object_id
    }
}

impl Entity for CostShare {
    const KIND: EntityKind = EntityKind::CostShare;
    fn id(&self) -> &str {
        &self.object_id
    }
}

impl Entity for LinkedServiceRecord {
    const KIND: EntityKind = EntityKind::LinkedService;
    fn id(&self) -> &str {
        &self.object_id
    }
}

impl Entity for Service {
    const KIND: EntityKind = EntityKind::Service;
    fn id(&self) -> &str {
        &self.object_id
    }
}

impl From<LinkedService> for LinkedServiceView {
    fn from(entry: LinkedService) -> Self {
        Self {
            object_id: entry.object_id,
            object_type: entry.object_type,
            org: entry.org,
            linked_service: Some(entry.linked_service),
            planservice_cost_shares: Some(entry.planservice_cost_shares),
            extra: entry.extra,
        }
    }
}

impl From<Plan> for PlanView {
    fn from(plan: Plan) -> Self {
        Self {
            object_id: plan.object_id,
            object_type: plan.object_type,
            org: plan.org,
            plan_type: plan.plan_type,
            creation_date: plan.creation_date,
            plan_cost_shares: Some(plan.plan_cost_shares),
            linked_plan_services: plan
                .linked_plan_services
                .into_iter()
                .map(LinkedServiceView::from)
                .collect(),
            extra: plan.extra,
        }
    }
}
