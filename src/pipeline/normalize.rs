//! Field normalizer: maps raw source fields into the canonical schema.
//!
//! Every rule here is a pure function of its input. Fields a source did not
//! observe stay absent; normalization never invents a value.

use crate::error::{Result, ScraperError};
use crate::types::{
    RawRecord, FIELD_EMAIL, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER, FIELD_SOCIAL_MEDIA,
    FIELD_SUBSCRIBERS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

static COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([km])?").unwrap());

/// Query parameters dropped during link normalization
const TRACKING_PARAMS: [&str; 5] = ["fbclid", "gclid", "ref", "mc_cid", "mc_eid"];

/// Social platforms recognized by domain
const PLATFORM_DOMAINS: [(&str, &str); 6] = [
    ("twitter.com", "twitter"),
    ("x.com", "twitter"),
    ("linkedin.com", "linkedin"),
    ("facebook.com", "facebook"),
    ("instagram.com", "instagram"),
    ("youtube.com", "youtube"),
];

pub const OTHER_PLATFORM: &str = "other";

/// Cleaned canonical fields extracted from one raw record. Only fields the
/// source observed and that survived cleaning are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialFields {
    pub name: Option<String>,
    pub link: Option<String>,
    pub publisher: Option<String>,
    pub email: Option<String>,
    pub subscriber_count: Option<u64>,
    pub social_accounts: BTreeMap<String, String>,
}

/// Normalize one raw record into canonical partial fields.
///
/// Fails with `MalformedRecord` only when neither a usable name nor a usable
/// link survives cleaning; such records carry nothing to identify them by.
pub fn normalize(record: &RawRecord) -> Result<PartialFields> {
    let mut out = PartialFields::default();

    if let Some(raw) = record.fields.get(FIELD_NAME).and_then(Value::as_str) {
        out.name = clean_text(raw);
    }
    if let Some(raw) = record.fields.get(FIELD_LINK).and_then(Value::as_str) {
        out.link = clean_link(raw);
    }
    if let Some(raw) = record.fields.get(FIELD_PUBLISHER).and_then(Value::as_str) {
        out.publisher = clean_text(raw);
    }
    if let Some(raw) = record.fields.get(FIELD_EMAIL).and_then(Value::as_str) {
        out.email = clean_email(raw);
    }
    if let Some(raw) = record.fields.get(FIELD_SUBSCRIBERS) {
        out.subscriber_count = parse_subscriber_count(raw);
    }
    if let Some(raw) = record.fields.get(FIELD_SOCIAL_MEDIA) {
        out.social_accounts = parse_social_accounts(raw);
    }

    if out.name.is_none() && out.link.is_none() {
        return Err(ScraperError::MalformedRecord(format!(
            "record from {} has no parseable name or link",
            record.source_id
        )));
    }

    Ok(out)
}

/// Trim, collapse internal whitespace, strip wrapping quotes.
fn clean_text(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    while s.len() >= 2 {
        let stripped = s
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| s.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        match stripped {
            Some(inner) => s = inner.trim(),
            None => break,
        }
    }
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Coerce to an absolute https URL, strip tracking parameters, fold the host
/// to lower case. `Url` parsing already lower-cases registered domain hosts.
fn clean_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    Some(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Lower-case and trim; drop anything that is not `local@domain.tld` shaped.
/// Deeper deliverability checks belong to the external verifier.
fn clean_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Some(email)
    } else {
        None
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Parse human-readable subscriber counts: `12.3k` -> 12300, `1,204` -> 1204,
/// `over 5000` -> 5000, `2M` -> 2000000. Unparsable input yields absence,
/// never zero.
fn parse_subscriber_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                Some(i)
            } else {
                // negative or fractional counts carry no usable information
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }
        }
        Value::String(s) => parse_count_text(s),
        _ => None,
    }
}

fn parse_count_text(raw: &str) -> Option<u64> {
    let cleaned = raw.to_lowercase().replace(',', "");
    if cleaned.contains('-') {
        // negative numbers and ranges are unparsable
        return None;
    }
    let caps = COUNT_RE.captures(&cleaned)?;
    let value: f64 = caps[1].parse().ok()?;
    match caps.get(2).map(|m| m.as_str()) {
        Some("k") => Some((value * 1_000.0).round() as u64),
        Some("m") => Some((value * 1_000_000.0).round() as u64),
        _ => {
            // a bare fraction without magnitude suffix claims precision no
            // source actually has
            if value.fract() == 0.0 {
                Some(value as u64)
            } else {
                None
            }
        }
    }
}

/// Parse platform-prefixed handles into (platform, handle) pairs. Accepts a
/// platform-keyed map, a list of URLs/handles, or a single string. Unknown
/// platforms are kept under `other`.
fn parse_social_accounts(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (platform, v) in map {
                if let Some(handle) = v.as_str() {
                    insert_handle(&mut out, Some(platform), handle);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(handle) = item.as_str() {
                    insert_handle(&mut out, None, handle);
                }
            }
        }
        Value::String(handle) => insert_handle(&mut out, None, handle),
        _ => {}
    }
    out
}

fn insert_handle(out: &mut BTreeMap<String, String>, platform_hint: Option<&str>, raw: &str) {
    let handle = raw.trim();
    if handle.is_empty() {
        return;
    }
    let platform = classify_platform(handle)
        .map(str::to_string)
        .or_else(|| {
            platform_hint
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
        })
        .unwrap_or_else(|| OTHER_PLATFORM.to_string());
    out.entry(platform).or_insert_with(|| handle.to_string());
}

fn classify_platform(handle: &str) -> Option<&'static str> {
    let lowered = handle.to_lowercase();
    PLATFORM_DOMAINS
        .iter()
        .find(|(domain, _)| lowered.contains(domain))
        .map(|(_, platform)| *platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;
    use serde_json::json;

    fn record_with(fields: &[(&str, Value)]) -> RawRecord {
        let mut record = RawRecord::new(SourceId::Rss);
        for (key, value) in fields {
            record.fields.insert(key.to_string(), value.clone());
        }
        record
    }

    #[test]
    fn name_is_trimmed_collapsed_and_unquoted() {
        let record = record_with(&[("name", json!("  \"The   Copy  Letter\"  "))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.name.as_deref(), Some("The Copy Letter"));
    }

    #[test]
    fn schemeless_link_gets_https_and_lowercased_host() {
        let record = record_with(&[("link", json!("Example.COM/Newsletter"))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(
            fields.link.as_deref(),
            Some("https://example.com/Newsletter")
        );
    }

    #[test]
    fn tracking_params_are_stripped_but_real_params_kept() {
        let record = record_with(&[(
            "link",
            json!("https://example.com/n?utm_source=x&utm_medium=y&page=2&fbclid=abc"),
        )]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.link.as_deref(), Some("https://example.com/n?page=2"));
    }

    #[test]
    fn only_tracking_params_leaves_bare_url() {
        let record = record_with(&[("link", json!("https://example.com/n?utm_source=x"))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.link.as_deref(), Some("https://example.com/n"));
    }

    #[test]
    fn invalid_email_is_dropped_not_kept() {
        let record = record_with(&[
            ("name", json!("Letters")),
            ("email", json!("not-an-email")),
        ]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.email, None);
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let record = record_with(&[
            ("name", json!("Letters")),
            ("email", json!("  Hello@Example.COM ")),
        ]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.email.as_deref(), Some("hello@example.com"));
    }

    #[test]
    fn subscriber_count_parses_human_readable_forms() {
        let cases = [
            (json!("12.3k"), Some(12300)),
            (json!("1,204"), Some(1204)),
            (json!("over 5000"), Some(5000)),
            (json!("5000+"), Some(5000)),
            (json!("2M"), Some(2_000_000)),
            (json!("N/A"), None),
            (json!(4821), Some(4821)),
            (json!(-12), None),
        ];
        for (raw, expected) in cases {
            let record = record_with(&[("name", json!("Letters")), ("subscribers", raw.clone())]);
            let fields = normalize(&record).unwrap();
            assert_eq!(fields.subscriber_count, expected, "input: {raw}");
        }
    }

    #[test]
    fn bare_fraction_without_suffix_is_absent() {
        let record = record_with(&[("name", json!("Letters")), ("subscribers", json!("12.3"))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.subscriber_count, None);
    }

    #[test]
    fn social_accounts_classified_by_domain() {
        let record = record_with(&[
            ("name", json!("Letters")),
            (
                "social_media",
                json!(["https://twitter.com/someone", "https://www.linkedin.com/in/someone"]),
            ),
        ]);
        let fields = normalize(&record).unwrap();
        assert_eq!(
            fields.social_accounts.get("twitter").map(String::as_str),
            Some("https://twitter.com/someone")
        );
        assert!(fields.social_accounts.contains_key("linkedin"));
    }

    #[test]
    fn unknown_platform_falls_back_to_other() {
        let record = record_with(&[("name", json!("Letters")), ("social_media", json!("@someone"))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(
            fields.social_accounts.get("other").map(String::as_str),
            Some("@someone")
        );
    }

    #[test]
    fn platform_keyed_map_is_accepted() {
        let record = record_with(&[
            ("name", json!("Letters")),
            ("social_media", json!({"Twitter": "https://twitter.com/someone"})),
        ]);
        let fields = normalize(&record).unwrap();
        assert!(fields.social_accounts.contains_key("twitter"));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let record = record_with(&[("name", json!("Letters"))]);
        let fields = normalize(&record).unwrap();
        assert_eq!(fields.link, None);
        assert_eq!(fields.publisher, None);
        assert_eq!(fields.email, None);
        assert_eq!(fields.subscriber_count, None);
        assert!(fields.social_accounts.is_empty());
    }

    #[test]
    fn record_without_name_or_link_is_malformed() {
        let record = record_with(&[("email", json!("a@b.com"))]);
        match normalize(&record) {
            Err(ScraperError::MalformedRecord(_)) => {}
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }
}
