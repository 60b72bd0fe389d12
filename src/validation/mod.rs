//! Structural validation of plan documents
//!
//! Validation runs before anything is written. A failing report carries one
//! [`FieldError`] per violation so clients can fix every problem in a single
//! round trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{Error, FieldError, Result};

/// Schema-backed validator
pub mod schema;

pub use schema::SchemaValidator;

/// Outcome of validating one candidate document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no errors were found
    pub valid: bool,
    /// Itemized failures
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// Build a report from collected errors
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into the crate error type
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Validates a candidate plan document before it is stored
pub trait PlanValidator: Send + Sync {
    /// Check structure and sibling identifier uniqueness
    fn validate(&self, document: &Value) -> ValidationReport;
}

/// Linked-service entries within one plan must have distinct ids
pub fn sibling_id_errors(document: &Value) -> Vec<FieldError> {
    let Some(entries) = document.get("linkedPlanServices").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let id = entry.get("objectId")?.as_str()?;
            if seen.insert(id) {
                None
            } else {
                Some(FieldError::new(
                    format!("/linkedPlanServices/{}/objectId", index),
                    format!("duplicate linked service id '{}'", id),
                ))
            }
        })
        .collect()
}
