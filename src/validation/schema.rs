//! JSON schema validator for plan documents

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::debug;

use super::{sibling_id_errors, PlanValidator, ValidationReport};
use crate::core::error::{Error, FieldError, Result};

/// Bundled draft-07 schema for the plan wire format
pub const PLAN_SCHEMA: &str = include_str!("../../schema/plan.schema.json");

/// Validator backed by a compiled JSON schema
pub struct SchemaValidator {
    compiled: JSONSchema,
}

impl SchemaValidator {
    /// Compile the bundled plan schema
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(PLAN_SCHEMA)?;
        Self::from_schema(&schema)
    }

    /// Compile a caller supplied schema
    pub fn from_schema(schema: &Value) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| Error::config(format!("Invalid plan schema: {}", e)))?;
        Ok(Self { compiled })
    }
}

impl PlanValidator for SchemaValidator {
    fn validate(&self, document: &Value) -> ValidationReport {
        let mut errors: Vec<FieldError> = match self.compiled.validate(document) {
            Ok(()) => Vec::new(),
            Err(failures) => failures
                .map(|e| {
                    let path = e.instance_path.to_string();
                    let field = if path.is_empty() { "/".to_string() } else { path };
                    FieldError::new(field, e.to_string())
                })
                .collect(),
        };
        errors.extend(sibling_id_errors(document));

        if !errors.is_empty() {
            debug!(count = errors.len(), "Plan document failed validation");
        }
        ValidationReport::from_errors(errors)
    }
}
