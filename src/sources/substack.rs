//! Platform discovery adapter: searches Substack's publication API per
//! keyword and optionally enriches each hit from its homepage.

use crate::config::{HttpConfig, SubstackSourceConfig};
use crate::error::{Result, ScraperError};
use crate::types::{
    NewsletterSource, RawRecord, SourceId, FIELD_EMAIL, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER,
    FIELD_SOCIAL_MEDIA, FIELD_SUBSCRIBERS,
};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

const SEARCH_URL: &str = "https://substack.com/api/v1/search/publications";

const SOCIAL_DOMAINS: [&str; 5] = [
    "twitter.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
];

pub struct SubstackCrawler {
    client: reqwest::Client,
    keywords: Vec<String>,
    search_limit: u32,
    fetch_details: bool,
}

impl SubstackCrawler {
    pub fn new(
        config: &SubstackSourceConfig,
        keywords: &[String],
        http: &HttpConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: crate::sources::build_client(http)?,
            keywords: keywords.to_vec(),
            search_limit: config.search_limit,
            fetch_details: config.fetch_details,
        })
    }

    async fn search(&self, keyword: &str) -> Result<Vec<RawRecord>> {
        debug!(%keyword, "Searching publications");
        let limit = self.search_limit.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("query", keyword),
                ("limit", limit.as_str()),
                ("offset", "0"),
                ("sort", "top"),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScraperError::Api {
                message: format!("publication search returned status {}", response.status()),
            });
        }

        let data: Value = response.json().await?;
        let publications = data
            .get("publications")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!(%keyword, count = publications.len(), "Search returned publications");

        let mut records = Vec::new();
        for publication in &publications {
            let Some(mut record) = record_from_publication(publication) else {
                continue;
            };
            if self.fetch_details {
                if let Some(link) = record
                    .fields
                    .get(FIELD_LINK)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                {
                    self.enrich_from_homepage(&mut record, &link).await;
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Best effort: the search hit already stands on its own, homepage
    /// details only add to it.
    async fn enrich_from_homepage(&self, record: &mut RawRecord, link: &str) {
        let body = match self.client.get(link).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(%link, error = %e, "Homepage body read failed");
                    return;
                }
            },
            Ok(response) => {
                debug!(%link, status = %response.status(), "Homepage fetch failed");
                return;
            }
            Err(e) => {
                debug!(%link, error = %e, "Homepage fetch failed");
                return;
            }
        };

        let (email, social) = extract_contacts(&body);
        if let Some(email) = email {
            if !record.fields.contains_key(FIELD_EMAIL) {
                record.set_field(FIELD_EMAIL, json!(email));
            }
        }
        if !social.is_empty() && !record.fields.contains_key(FIELD_SOCIAL_MEDIA) {
            record.set_field(FIELD_SOCIAL_MEDIA, json!(social));
        }
    }
}

#[async_trait::async_trait]
impl NewsletterSource for SubstackCrawler {
    fn source_id(&self) -> SourceId {
        SourceId::Substack
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        for keyword in &self.keywords {
            match self.search(keyword).await {
                Ok(mut found) => records.append(&mut found),
                Err(e) => warn!(%keyword, error = %e, "Publication search failed"),
            }
        }
        info!(count = records.len(), "Collected publication records");
        Ok(records)
    }
}

fn record_from_publication(publication: &Value) -> Option<RawRecord> {
    let name = publication.get("name").and_then(Value::as_str).unwrap_or("");
    let subdomain = publication
        .get("subdomain")
        .and_then(Value::as_str)
        .unwrap_or("");
    if name.is_empty() && subdomain.is_empty() {
        return None;
    }

    let mut record = RawRecord::new(SourceId::Substack);
    record.set_field(FIELD_NAME, json!(name));
    if !subdomain.is_empty() {
        record.set_field(FIELD_LINK, json!(format!("https://{}.substack.com", subdomain)));
    }
    if let Some(author) = publication.get("author_name").and_then(Value::as_str) {
        record.set_field(FIELD_PUBLISHER, json!(author));
    }
    if let Some(subscribers) = publication.get("total_subscribers") {
        if subscribers.is_number() || subscribers.is_string() {
            record.set_field(FIELD_SUBSCRIBERS, subscribers.clone());
        }
    }
    Some(record)
}

/// Pull a mailto address and social profile links out of a homepage.
fn extract_contacts(html: &str) -> (Option<String>, Vec<String>) {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").unwrap();

    let mut email = None;
    let mut social = Vec::new();
    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(address) = href.strip_prefix("mailto:") {
            if email.is_none() && !address.is_empty() {
                email = Some(address.to_string());
            }
        } else if SOCIAL_DOMAINS.iter().any(|domain| href.contains(domain)) {
            if !social.iter().any(|existing| existing == href) {
                social.push(href.to_string());
            }
        }
    }
    (email, social)
}
