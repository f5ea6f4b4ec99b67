//! Completeness policy: which canonical records qualify and which are kept.

use crate::pipeline::merge::CanonicalRecord;
use crate::pipeline::normalize;

/// Pluggable email verification predicate. The pipeline only requires a
/// yes/no answer; deliverability checks live behind this seam.
pub trait EmailVerifier: Send + Sync {
    fn verify(&self, email: &str) -> bool;
}

/// Built-in verifier that re-checks syntactic shape only.
pub struct SyntaxEmailVerifier;

impl EmailVerifier for SyntaxEmailVerifier {
    fn verify(&self, email: &str) -> bool {
        normalize::is_valid_email(email)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunPolicy {
    pub complete_only: bool,
}

/// A record is complete when all five scalar fields are present.
/// Social accounts are not required.
pub fn is_complete(record: &CanonicalRecord) -> bool {
    record.name.is_some()
        && record.link.is_some()
        && record.publisher.is_some()
        && record.email.is_some()
        && record.subscriber_count.is_some()
}

/// Decide whether a finalized record is kept. Without `complete_only`,
/// everything is kept and completeness is metadata only.
pub fn keep(
    record: &CanonicalRecord,
    policy: &RunPolicy,
    verifier: Option<&dyn EmailVerifier>,
) -> bool {
    if !policy.complete_only {
        return true;
    }
    if !record.is_complete {
        return false;
    }
    match (verifier, record.email.as_deref()) {
        (Some(verifier), Some(email)) => verifier.verify(email),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::identity;
    use crate::pipeline::merge::{MergeEngine, SourceRanking};
    use crate::pipeline::normalize::PartialFields;
    use crate::types::SourceId;

    fn canonical(subscriber_count: Option<u64>) -> CanonicalRecord {
        let fields = PartialFields {
            name: Some("Letters".to_string()),
            link: Some("https://example.com/n".to_string()),
            publisher: Some("Jane".to_string()),
            email: Some("jane@example.com".to_string()),
            subscriber_count,
            ..Default::default()
        };
        let key = identity::resolve(&fields).unwrap();
        let mut engine = MergeEngine::new(SourceRanking::default());
        engine.merge(key, fields, SourceId::Substack);
        engine.into_records().remove(0)
    }

    #[test]
    fn missing_subscriber_count_is_incomplete() {
        let record = canonical(None);
        assert!(!record.is_complete);
    }

    #[test]
    fn all_scalar_fields_present_is_complete() {
        let record = canonical(Some(1200));
        assert!(record.is_complete);
    }

    #[test]
    fn complete_only_drops_incomplete_records() {
        let record = canonical(None);
        let policy = RunPolicy {
            complete_only: true,
        };
        assert!(!keep(&record, &policy, None));
    }

    #[test]
    fn without_complete_only_everything_is_kept() {
        let record = canonical(None);
        let policy = RunPolicy {
            complete_only: false,
        };
        assert!(keep(&record, &policy, None));
        assert!(!record.is_complete);
    }

    #[test]
    fn verifier_gates_complete_records() {
        struct RejectAll;
        impl EmailVerifier for RejectAll {
            fn verify(&self, _email: &str) -> bool {
                false
            }
        }

        let record = canonical(Some(1200));
        let policy = RunPolicy {
            complete_only: true,
        };
        assert!(keep(&record, &policy, Some(&SyntaxEmailVerifier)));
        assert!(!keep(&record, &policy, Some(&RejectAll)));
    }
}
