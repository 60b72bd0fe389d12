//! JSON merge patch (RFC 7396)
//!
//! A raw JSON patch is first parsed into a [`Patch`] tree so that "delete
//! this key" is an explicit variant instead of a `null` that is easy to
//! confuse with an absent field. Applying the tree is then a plain recursive
//! walk.

use serde_json::{Map, Value};

/// Parsed merge patch
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Remove the member (`null` in the raw patch)
    Delete,
    /// Replace the target with this value
    Replace(Value),
    /// Recurse into an object, member by member
    Merge(Vec<(String, Patch)>),
}

impl Patch {
    /// Parse a raw merge-patch document
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Null => Patch::Delete,
            Value::Object(members) => Patch::Merge(
                members
                    .iter()
                    .map(|(key, value)| (key.clone(), Patch::parse(value)))
                    .collect(),
            ),
            other => Patch::Replace(other.clone()),
        }
    }

    /// Apply the patch to `target`, producing the merged value.
    ///
    /// A top-level `Delete` yields `Value::Null`.
    pub fn apply(&self, target: Value) -> Value {
        match self {
            Patch::Delete => Value::Null,
            Patch::Replace(value) => value.clone(),
            Patch::Merge(members) => {
                let mut object = match target {
                    Value::Object(object) => object,
                    _ => Map::new(),
                };
                for (key, member) in members {
                    match member {
                        Patch::Delete => {
                            object.remove(key);
                        }
                        _ => {
                            let current = object.remove(key).unwrap_or(Value::Null);
                            object.insert(key.clone(), member.apply(current));
                        }
                    }
                }
                Value::Object(object)
            }
        }
    }
}

/// Apply a raw merge patch to `target`
pub fn merge_patch(target: &Value, patch: &Value) -> Value {
    Patch::parse(patch).apply(target.clone())
}
