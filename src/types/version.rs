//! Version tokens and entity tags
//!
//! A [`VersionToken`] is a BLAKE3 digest over the canonical JSON encoding of
//! an entity. Two entities with equal canonical content always share a token.
//! A plan's composite token folds in every descendant token, and is what gets
//! exposed to clients as an [`ETag`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Content-derived version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionToken([u8; 32]);

impl VersionToken {
    /// Token for a JSON value, computed over its canonical encoding
    pub fn of_value(value: &Value) -> Self {
        let mut hasher = blake3::Hasher::new();
        write_canonical(value, &mut hasher);
        Self(*hasher.finalize().as_bytes())
    }

    /// Token for raw bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Combine a reference token with its descendants' tokens.
    ///
    /// Descendant tokens are sorted before hashing, so the result does not
    /// depend on traversal order.
    pub fn composite(reference: &VersionToken, descendants: &[VersionToken]) -> Self {
        let mut sorted = descendants.to_vec();
        sorted.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&reference.0);
        for token in &sorted {
            hasher.update(&[0]);
            hasher.update(&token.0);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parse the lowercase hex form
    pub fn from_hex(s: &str) -> Option<Self> {
        blake3::Hash::from_hex(s).ok().map(|h| Self(*h.as_bytes()))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Write a value in canonical form: object keys sorted, no whitespace.
///
/// `serde_json::Map` already iterates in key order, but writing the encoding
/// by hand keeps the token independent of that crate feature.
fn write_canonical(value: &Value, hasher: &mut blake3::Hasher) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_string(key, hasher);
                hasher.update(b":");
                write_canonical(&map[key], hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        Value::String(s) => write_string(s, hasher),
        other => {
            hasher.update(other.to_string().as_bytes());
        }
    }
}

fn write_string(s: &str, hasher: &mut blake3::Hasher) {
    // Value::String's Display produces a JSON-escaped literal
    hasher.update(Value::String(s.to_owned()).to_string().as_bytes());
}

/// An HTTP entity tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag {
    /// Opaque tag value without quotes
    pub tag: String,
    /// `W/` prefixed tag
    pub weak: bool,
}

impl ETag {
    /// Strong tag for a version token
    pub fn strong(token: &VersionToken) -> Self {
        Self {
            tag: token.to_hex(),
            weak: false,
        }
    }

    /// Parse a single entity tag. Unquoted values are accepted as-is.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (weak, rest) = match raw.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let tag = if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
            &rest[1..rest.len() - 1]
        } else {
            rest
        };
        if tag.is_empty() || tag.contains('"') {
            return None;
        }
        Some(Self {
            tag: tag.to_string(),
            weak,
        })
    }

    /// Strong comparison: both tags strong and identical
    pub fn strong_eq(&self, other: &ETag) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }

    /// Weak comparison: opaque values identical
    pub fn weak_eq(&self, other: &ETag) -> bool {
        self.tag == other.tag
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.tag)
        } else {
            write!(f, "\"{}\"", self.tag)
        }
    }
}

/// Parsed value of a conditional request header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    /// `*`
    Any,
    /// Comma separated list of tags
    Tags(Vec<ETag>),
}

impl Conditional {
    /// Parse an `If-Match` / `If-None-Match` header value
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim() == "*" {
            return Some(Conditional::Any);
        }
        let tags: Vec<ETag> = raw.split(',').filter_map(ETag::parse).collect();
        if tags.is_empty() {
            None
        } else {
            Some(Conditional::Tags(tags))
        }
    }

    /// `If-Match` semantics: strong comparison against any listed tag.
    /// `*` never matches a specific version.
    pub fn matches_strong(&self, current: &ETag) -> bool {
        match self {
            Conditional::Any => false,
            Conditional::Tags(tags) => tags.iter().any(|t| t.strong_eq(current)),
        }
    }

    /// `If-None-Match` semantics: weak comparison, `*` matches anything
    pub fn matches_weak(&self, current: &ETag) -> bool {
        match self {
            Conditional::Any => true,
            Conditional::Tags(tags) => tags.iter().any(|t| t.weak_eq(current)),
        }
    }
}
