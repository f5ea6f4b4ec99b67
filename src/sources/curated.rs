//! Curated-list adapter: mines "best newsletters" roundup pages.
//!
//! List pages have no common structure, so extraction is heuristic:
//! keyword-matched headings with a nearby link, plus list items linking to
//! known newsletter platforms.

use crate::config::{CuratedListSourceConfig, HttpConfig};
use crate::error::Result;
use crate::types::{
    NewsletterSource, RawRecord, SourceId, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::{info, instrument, warn};
use url::Url;

// Capitalized words only, so "by Jane Roe about copy" stops at the name
static BY_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[Bb]y\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*){0,2})").unwrap());

/// Platforms whose links inside list items identify a newsletter
const NEWSLETTER_DOMAINS: [&str; 4] = [
    "substack.com",
    "beehiiv.com",
    "convertkit.com",
    "newsletter",
];

pub struct CuratedListCrawler {
    client: reqwest::Client,
    urls: Vec<String>,
    keywords: Vec<String>,
}

impl CuratedListCrawler {
    pub fn new(
        config: &CuratedListSourceConfig,
        keywords: &[String],
        http: &HttpConfig,
    ) -> Result<Self> {
        let mut keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        keywords.push("newsletter".to_string());
        Ok(Self {
            client: crate::sources::build_client(http)?,
            urls: config.urls.clone(),
            keywords,
        })
    }
}

#[async_trait::async_trait]
impl NewsletterSource for CuratedListCrawler {
    fn source_id(&self) -> SourceId {
        SourceId::CuratedList
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        for url in &self.urls {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(html) => {
                        let mut found = extract_items(&html, url, &self.keywords);
                        info!(%url, count = found.len(), "Mined curated list");
                        records.append(&mut found);
                    }
                    Err(e) => warn!(%url, error = %e, "Failed to read curated list body"),
                },
                Ok(response) => {
                    warn!(%url, status = %response.status(), "Curated list fetch failed")
                }
                Err(e) => warn!(%url, error = %e, "Curated list fetch failed"),
            }
        }
        Ok(records)
    }
}

fn extract_items(html: &str, source_url: &str, keywords: &[String]) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let heading_selector = Selector::parse("h2, h3, h4").unwrap();
    let anchor_selector = Selector::parse("a[href]").unwrap();
    let list_item_selector = Selector::parse("li").unwrap();

    let base_url = Url::parse(source_url).ok();
    let mut records = Vec::new();

    // Keyword-matched headings with a link inside or just after them
    for heading in document.select(&heading_selector) {
        let text = heading.text().collect::<String>();
        let lowered = text.to_lowercase();
        if !keywords.iter().any(|kw| lowered.contains(kw)) {
            continue;
        }
        let Some(anchor) = nearby_anchor(&heading, &anchor_selector) else {
            continue;
        };
        let Some(link) = absolutize(anchor.value().attr("href"), base_url.as_ref()) else {
            continue;
        };

        let mut record = RawRecord::new(SourceId::CuratedList);
        record.set_field(FIELD_NAME, json!(text.trim()));
        record.set_field(FIELD_LINK, json!(link));
        if let Some(publisher) = by_line_publisher(&heading) {
            record.set_field(FIELD_PUBLISHER, json!(publisher));
        }
        records.push(record);
    }

    // List items linking straight to a newsletter platform
    for item in document.select(&list_item_selector) {
        let Some(anchor) = item.select(&anchor_selector).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !NEWSLETTER_DOMAINS.iter().any(|domain| href.contains(domain)) {
            continue;
        }
        let Some(link) = absolutize(Some(href), base_url.as_ref()) else {
            continue;
        };

        let mut record = RawRecord::new(SourceId::CuratedList);
        let name = anchor.text().collect::<String>();
        record.set_field(FIELD_NAME, json!(name.trim()));
        record.set_field(FIELD_LINK, json!(link));
        records.push(record);
    }

    records
}

/// A link inside the heading, or the first link in the next few siblings.
fn nearby_anchor<'a>(heading: &ElementRef<'a>, anchor_selector: &Selector) -> Option<ElementRef<'a>> {
    if let Some(anchor) = heading.select(anchor_selector).next() {
        return Some(anchor);
    }
    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take(3)
        .find_map(|sibling| {
            if sibling.value().name() == "a" {
                Some(sibling)
            } else {
                sibling.select(anchor_selector).next()
            }
        })
}

/// Extract an author from a "by Jane Roe" line in the element following the
/// heading, when one exists.
fn by_line_publisher(heading: &ElementRef<'_>) -> Option<String> {
    let following = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "p" | "div"))?;
    let text = following.text().collect::<String>();
    BY_LINE_RE
        .captures(&text)
        .map(|caps| caps[1].trim().to_string())
}

fn absolutize(href: Option<&str>, base_url: Option<&Url>) -> Option<String> {
    let href = href?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.contains("://") {
        return Some(href.to_string());
    }
    base_url.and_then(|base| base.join(href).ok()).map(|u| u.to_string())
}
