//! Shared fixtures for unit tests

use serde_json::{json, Value};

/// A valid plan document with one linked service
pub fn sample_plan(id: &str) -> Value {
    json!({
        "objectId": id,
        "objectType": "plan",
        "_org": "example.com",
        "planType": "inNetwork",
        "creationDate": "12-12-2017",
        "planCostShares": cost_share(&format!("{}-cs", id), 2000, 23),
        "linkedPlanServices": [linked_service(&format!("{}-ps-1", id), "Yearly physical")]
    })
}

/// A cost-share entity
pub fn cost_share(id: &str, deductible: u64, copay: u64) -> Value {
    json!({
        "objectId": id,
        "objectType": "membercostshare",
        "_org": "example.com",
        "deductible": deductible,
        "copay": copay
    })
}

/// A linked-service entry with its nested service and cost share
pub fn linked_service(id: &str, name: &str) -> Value {
    json!({
        "objectId": id,
        "objectType": "planservice",
        "_org": "example.com",
        "linkedService": {
            "objectId": format!("{}-svc", id),
            "objectType": "service",
            "_org": "example.com",
            "name": name
        },
        "planserviceCostShares": cost_share(&format!("{}-cs", id), 10, 0)
    })
}
