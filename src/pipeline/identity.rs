//! Identity resolution: a stable key to match records across sources.
//!
//! There is no universal newsletter id, so the key is heuristic with two
//! documented tiers. The link is the most source-stable unique identifier
//! and wins when present; the name/publisher fallback can collide for
//! unrelated newsletters sharing a generic name, which is accepted and
//! logged rather than patched over with fuzzy matching.

use crate::pipeline::normalize::PartialFields;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the identity key for a normalized record.
///
/// Tier 1: the link's host + path, case-folded, trailing slash stripped.
/// Tier 2: case-folded alphanumeric name, joined with the publisher when
/// present. `None` only when both tiers come up empty.
pub fn resolve(fields: &PartialFields) -> Option<IdentityKey> {
    if let Some(link) = fields.link.as_deref() {
        if let Some(key) = link_key(link) {
            return Some(IdentityKey(key));
        }
    }

    let name = fields.name.as_deref().map(fold)?;
    if name.is_empty() {
        return None;
    }
    let key = match fields.publisher.as_deref().map(fold) {
        Some(publisher) if !publisher.is_empty() => format!("{}|{}", name, publisher),
        _ => name,
    };
    debug!(key = %key, "identity resolved from name fallback, collision risk accepted");
    Some(IdentityKey(key))
}

fn link_key(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?.to_lowercase();
    let path = url.path().to_lowercase();
    let path = path.trim_end_matches('/');
    Some(format!("{}{}", host, path))
}

fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
