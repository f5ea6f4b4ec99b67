use crate::constants;
use crate::error::{Result, ScraperError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an originating source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Rss,
    Feedspot,
    CuratedList,
    Substack,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Rss => constants::RSS_SOURCE,
            SourceId::Feedspot => constants::FEEDSPOT_SOURCE,
            SourceId::CuratedList => constants::CURATED_LIST_SOURCE,
            SourceId::Substack => constants::SUBSTACK_SOURCE,
        }
    }

    /// Parse a source name as used in config files and on the CLI.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            constants::RSS_SOURCE => Ok(SourceId::Rss),
            constants::FEEDSPOT_SOURCE => Ok(SourceId::Feedspot),
            constants::CURATED_LIST_SOURCE => Ok(SourceId::CuratedList),
            constants::SUBSTACK_SOURCE => Ok(SourceId::Substack),
            other => Err(ScraperError::Config(format!(
                "Unknown source id '{}'. Supported: {}",
                other,
                constants::supported_sources().join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Raw field keys recognized by the normalizer
pub const FIELD_NAME: &str = "name";
pub const FIELD_LINK: &str = "link";
pub const FIELD_PUBLISHER: &str = "publisher";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_SUBSCRIBERS: &str = "subscribers";
pub const FIELD_SOCIAL_MEDIA: &str = "social_media";

/// One source hit, exactly as the adapter observed it. Only fields the
/// source actually saw are present in `fields` (absent, not empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: SourceId,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub fetched_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            fields: serde_json::Map::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Set a field only when the source observed a non-empty value.
    pub fn set_field(&mut self, key: &str, value: serde_json::Value) {
        let empty = match &value {
            serde_json::Value::String(s) => s.trim().is_empty(),
            serde_json::Value::Null => true,
            serde_json::Value::Object(m) => m.is_empty(),
            serde_json::Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if !empty {
            self.fields.insert(key.to_string(), value);
        }
    }
}

/// Core trait that all newsletter data sources must implement
#[async_trait::async_trait]
pub trait NewsletterSource: Send + Sync {
    /// Unique identifier for this source adapter
    fn source_id(&self) -> SourceId;

    /// Fetch all newsletter records from this data source
    async fn collect(&self) -> Result<Vec<RawRecord>>;
}
