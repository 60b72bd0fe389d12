//! Plan-aware merge patch.
//!
//! Scalar plan fields follow plain RFC 7396 rules. The two child collections
//! do not: `planCostShares` is swapped out wholesale, and
//! `linkedPlanServices` is upserted by entry id so a patch can never drop
//! entries it does not mention. Within an existing entry, a nested child is
//! merged only while it keeps its id; naming a different id replaces the
//! child wholesale so no fields leak onto another stored entity.

use serde_json::{Map, Value};

use crate::core::error::{Error, Result};
use crate::patch::merge_patch;

const PLAN_COST_SHARES: &str = "planCostShares";
const LINKED_PLAN_SERVICES: &str = "linkedPlanServices";
const OBJECT_ID: &str = "objectId";
const ENTRY_CHILDREN: [&str; 2] = ["linkedService", "planserviceCostShares"];

/// Apply a merge patch to a materialized plan document
pub fn apply_plan_patch(current: &Value, patch: &Value) -> Result<Value> {
    let Value::Object(patch) = patch else {
        return Err(Error::invalid_field("/", "merge patch for a plan must be a JSON object"));
    };

    if let Some(patched_id) = patch.get(OBJECT_ID) {
        if current.get(OBJECT_ID) != Some(patched_id) {
            return Err(Error::invalid_field("/objectId", "plan id cannot be changed by a patch"));
        }
    }

    let mut scalars = patch.clone();
    let cost_shares = scalars.remove(PLAN_COST_SHARES);
    let linked = scalars.remove(LINKED_PLAN_SERVICES);

    let mut next = merge_patch(current, &Value::Object(scalars));
    let Value::Object(root) = &mut next else {
        return Err(Error::invalid_field("/", "stored plan is not a JSON object"));
    };

    match cost_shares {
        None => {}
        Some(Value::Null) => {
            return Err(Error::invalid_field("/planCostShares", "plan cost share cannot be removed"));
        }
        Some(replacement) => {
            root.insert(PLAN_COST_SHARES.to_string(), merge_patch(&Value::Null, &replacement));
        }
    }

    if let Some(linked) = linked {
        let Value::Array(patch_entries) = linked else {
            return Err(Error::invalid_field(
                "/linkedPlanServices",
                "linked services must be patched with an array of entries",
            ));
        };
        let entries = root
            .entry(LINKED_PLAN_SERVICES)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entries.is_array() {
            *entries = Value::Array(Vec::new());
        }
        if let Value::Array(entries) = entries {
            upsert_entries(entries, &patch_entries)?;
        }
    }

    Ok(next)
}

fn upsert_entries(entries: &mut Vec<Value>, patch_entries: &[Value]) -> Result<()> {
    for (index, patch_entry) in patch_entries.iter().enumerate() {
        let id = entry_id(patch_entry).ok_or_else(|| {
            Error::invalid_field(
                format!("/linkedPlanServices/{}/objectId", index),
                "linked service entry in a patch must carry an objectId",
            )
        })?;

        match entries.iter_mut().find(|e| entry_id(e) == Some(id)) {
            Some(existing) => *existing = merge_entry(existing, patch_entry),
            None => entries.push(merge_patch(&Value::Object(Map::new()), patch_entry)),
        }
    }
    Ok(())
}

fn merge_entry(existing: &Value, patch_entry: &Value) -> Value {
    let mut merged = merge_patch(existing, patch_entry);
    let Value::Object(merged_fields) = &mut merged else {
        return merged;
    };

    for child in ENTRY_CHILDREN {
        let Some(child_patch) = patch_entry.get(child) else {
            continue;
        };
        let patched_id = child_patch.get(OBJECT_ID);
        let current_id = existing.get(child).and_then(|c| c.get(OBJECT_ID));
        if patched_id.is_some() && patched_id != current_id {
            merged_fields.insert(child.to_string(), merge_patch(&Value::Null, child_patch));
        }
    }
    merged
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry
        .get(OBJECT_ID)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}
