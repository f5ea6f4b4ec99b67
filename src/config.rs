use crate::error::{Result, ScraperError};
use crate::types::SourceId;
use serde::Deserialize;
use std::fs;

/// Run configuration, loaded from `config.toml` and optionally overridden
/// from the CLI. Validation happens once, before any adapter runs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Keep only records with all required fields present
    pub complete_only: bool,
    /// Maximum canonical records to keep, unlimited when absent
    pub limit: Option<usize>,
    /// Disable the email verification predicate
    pub skip_email_verification: bool,
    /// Maximum adapters fetching at once
    pub concurrency: usize,
    /// Per-adapter fetch budget; a source that exceeds it contributes zero
    /// records but does not fail the run
    pub source_timeout_seconds: u64,
    /// Source quality ranking, highest first. Empty means the built-in
    /// default order.
    pub source_priority: Vec<String>,
    /// Seed terms passed opaquely to adapters that support search
    pub keywords: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            complete_only: false,
            limit: None,
            skip_email_verification: false,
            concurrency: 4,
            source_timeout_seconds: 120,
            source_priority: Vec::new(),
            keywords: vec!["copywriting".to_string(), "marketing".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source adapters to enable for this run
    pub enabled: Vec<String>,
    pub rss: RssSourceConfig,
    pub feedspot: FeedspotSourceConfig,
    pub curated_list: CuratedListSourceConfig,
    pub substack: SubstackSourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: crate::constants::supported_sources()
                .into_iter()
                .map(String::from)
                .collect(),
            rss: RssSourceConfig::default(),
            feedspot: FeedspotSourceConfig::default(),
            curated_list: CuratedListSourceConfig::default(),
            substack: SubstackSourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RssSourceConfig {
    /// Websites to probe for RSS/Atom feeds
    pub websites: Vec<String>,
    pub max_feeds_per_site: usize,
}

impl Default for RssSourceConfig {
    fn default() -> Self {
        Self {
            websites: Vec::new(),
            max_feeds_per_site: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedspotSourceConfig {
    /// Directory page listing newsletters
    pub url: String,
}

impl Default for FeedspotSourceConfig {
    fn default() -> Self {
        Self {
            url: "https://blog.feedspot.com/copywriting_blogs/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CuratedListSourceConfig {
    /// Curated "best newsletters" list pages to mine
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubstackSourceConfig {
    pub search_limit: u32,
    /// Also fetch each publication homepage for email/social details
    pub fetch_details: bool,
}

impl Default for SubstackSourceConfig {
    fn default() -> Self {
        Self {
            search_limit: 50,
            fetch_details: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sink formats to write: csv, json
    pub formats: Vec<String>,
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec!["csv".to_string()],
            dir: "data".to_string(),
        }
    }
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Sources enabled for this run, in configured order.
    pub fn enabled_sources(&self) -> Result<Vec<SourceId>> {
        self.sources
            .enabled
            .iter()
            .map(|name| SourceId::parse(name))
            .collect()
    }

    /// The effective quality ranking, highest first.
    pub fn source_priority(&self) -> Result<Vec<SourceId>> {
        if self.run.source_priority.is_empty() {
            return Ok(crate::constants::DEFAULT_SOURCE_PRIORITY.to_vec());
        }
        self.run
            .source_priority
            .iter()
            .map(|name| SourceId::parse(name))
            .collect()
    }

    /// Reject invalid option combinations before any adapter runs.
    pub fn validate(&self) -> Result<()> {
        let enabled = self.enabled_sources()?;
        if enabled.is_empty() {
            return Err(ScraperError::Config("No sources enabled".to_string()));
        }

        let priority = self.source_priority()?;
        for source in &enabled {
            if !priority.contains(source) {
                return Err(ScraperError::Config(format!(
                    "Source '{}' is enabled but missing from source_priority; \
                     the quality ranking must be total",
                    source
                )));
            }
        }

        if self.run.concurrency == 0 {
            return Err(ScraperError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        for format in &self.output.formats {
            if format != "csv" && format != "json" {
                return Err(ScraperError::Config(format!(
                    "Unknown output format '{}'. Supported: csv, json",
                    format
                )));
            }
        }

        Ok(())
    }
}
