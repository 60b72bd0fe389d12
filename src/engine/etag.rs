//! Composite entity tags and conditional request checks.

use crate::core::error::{Error, Result};
use crate::types::{Conditional, ETag, VersionToken};

use super::normalize::Materialized;

/// Composite tag for a plan: reference token folded with every descendant
pub fn composite_etag(reference: &VersionToken, descendants: &[VersionToken]) -> ETag {
    ETag::strong(&VersionToken::composite(reference, descendants))
}

impl Materialized {
    /// Composite tag of this materialization
    pub fn etag(&self) -> ETag {
        composite_etag(&self.reference_token, &self.descendant_tokens)
    }
}

/// Require a concrete `If-Match` value on a mutating request.
///
/// `*` is rejected like an absent header: callers must prove which version
/// they are overwriting.
pub fn require_if_match(if_match: Option<&Conditional>) -> Result<&[ETag]> {
    match if_match {
        Some(Conditional::Tags(tags)) => Ok(tags),
        Some(Conditional::Any) | None => Err(Error::PreconditionRequired),
    }
}

/// Compare the supplied tags against the current composite tag
pub fn check_if_match(id: &str, supplied: &[ETag], current: &ETag) -> Result<()> {
    if supplied.iter().any(|tag| tag.strong_eq(current)) {
        Ok(())
    } else {
        Err(Error::PreconditionFailed { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_star_require_precondition() {
        assert!(matches!(require_if_match(None), Err(Error::PreconditionRequired)));
        assert!(matches!(
            require_if_match(Some(&Conditional::Any)),
            Err(Error::PreconditionRequired)
        ));
    }

    #[test]
    fn test_stale_tag_fails() {
        let current = composite_etag(&VersionToken::of_bytes(b"root"), &[]);
        let stale = composite_etag(&VersionToken::of_bytes(b"old"), &[]);

        assert!(check_if_match("p", &[current.clone()], &current).is_ok());
        assert!(matches!(
            check_if_match("p", &[stale], &current),
            Err(Error::PreconditionFailed { ref id }) if id == "p"
        ));
    }

    #[test]
    fn test_weak_tag_never_satisfies_if_match() {
        let current = composite_etag(&VersionToken::of_bytes(b"root"), &[]);
        let weak = ETag {
            tag: current.tag.clone(),
            weak: true,
        };
        assert!(check_if_match("p", &[weak], &current).is_err());
    }
}
