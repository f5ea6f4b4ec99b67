//! RSS/Atom adapter: discovers feeds on configured websites and reads each
//! feed's channel metadata as one newsletter record.

use crate::config::{HttpConfig, RssSourceConfig};
use crate::error::{Result, ScraperError};
use crate::types::{
    NewsletterSource, RawRecord, SourceId, FIELD_EMAIL, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Probed when a homepage advertises no feed in its head
const COMMON_FEED_PATHS: [&str; 8] = [
    "/feed/",
    "/rss/",
    "/feed.xml",
    "/rss.xml",
    "/atom.xml",
    "/blog/feed/",
    "/blog/rss/",
    "/index.xml",
];

pub struct RssCrawler {
    client: reqwest::Client,
    websites: Vec<String>,
    max_feeds_per_site: usize,
}

impl RssCrawler {
    pub fn new(config: &RssSourceConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: crate::sources::build_client(http)?,
            websites: config.websites.clone(),
            max_feeds_per_site: config.max_feeds_per_site,
        })
    }

    /// Find feed URLs for a website: `<link rel="alternate">` tags first,
    /// well-known paths as fallback.
    async fn discover_feeds(&self, website: &str) -> Result<Vec<String>> {
        let base = if website.contains("://") {
            website.to_string()
        } else {
            format!("https://{}", website)
        };
        let base_url = Url::parse(&base).map_err(|e| ScraperError::Api {
            message: format!("invalid website '{}': {}", website, e),
        })?;

        let html = self
            .client
            .get(base_url.as_str())
            .send()
            .await?
            .text()
            .await?;

        let mut feeds = advertised_feeds(&html, &base_url);

        if feeds.is_empty() {
            for path in COMMON_FEED_PATHS {
                if feeds.len() >= self.max_feeds_per_site {
                    break;
                }
                let Ok(candidate) = base_url.join(path) else {
                    continue;
                };
                match self.client.get(candidate.as_str()).send().await {
                    Ok(response) if response.status().is_success() => {
                        let is_xml = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|ct| ct.contains("xml"))
                            .unwrap_or(false);
                        if is_xml {
                            feeds.push(candidate.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(feeds)
    }

    async fn fetch_channel(&self, feed_url: &str) -> Result<Option<RawRecord>> {
        let body = self.client.get(feed_url).send().await?.text().await?;
        let channel = parse_channel(&body)?;

        if channel.title.is_none() && channel.link.is_none() {
            return Ok(None);
        }

        let mut record = RawRecord::new(SourceId::Rss);
        if let Some(title) = channel.title {
            record.set_field(FIELD_NAME, json!(title));
        }
        let link = channel.link.unwrap_or_else(|| feed_url.to_string());
        record.set_field(FIELD_LINK, json!(link));
        if let Some(author) = channel.author {
            record.set_field(FIELD_PUBLISHER, json!(author));
        }
        if let Some(email) = channel.email {
            record.set_field(FIELD_EMAIL, json!(email));
        }
        Ok(Some(record))
    }
}

#[async_trait::async_trait]
impl NewsletterSource for RssCrawler {
    fn source_id(&self) -> SourceId {
        SourceId::Rss
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        for website in &self.websites {
            let feeds = match self.discover_feeds(website).await {
                Ok(feeds) => feeds,
                Err(e) => {
                    warn!(%website, error = %e, "Feed discovery failed");
                    continue;
                }
            };
            debug!(%website, count = feeds.len(), "Discovered feeds");

            for feed_url in feeds.into_iter().take(self.max_feeds_per_site) {
                match self.fetch_channel(&feed_url).await {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => debug!(%feed_url, "Feed carries no channel metadata"),
                    Err(e) => warn!(%feed_url, error = %e, "Feed parse failed"),
                }
            }
        }
        info!(count = records.len(), "Collected RSS channel records");
        Ok(records)
    }
}

fn advertised_feeds(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"link[rel="alternate"]"#).unwrap();

    let mut feeds = Vec::new();
    for element in document.select(&selector) {
        let is_feed = element
            .value()
            .attr("type")
            .map(|t| t.contains("rss") || t.contains("atom") || t.contains("xml"))
            .unwrap_or(false);
        if !is_feed {
            continue;
        }
        if let Some(href) = element.value().attr("href") {
            if let Ok(resolved) = base_url.join(href) {
                feeds.push(resolved.to_string());
            }
        }
    }
    feeds
}

#[derive(Debug, Default, PartialEq)]
struct ChannelMeta {
    title: Option<String>,
    link: Option<String>,
    author: Option<String>,
    email: Option<String>,
}

/// Walk the feed XML and pull channel-level metadata, ignoring items and
/// entries. Handles both RSS 2.0 (`channel`) and Atom (`feed`) shapes.
fn parse_channel(xml: &str) -> Result<ChannelMeta> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut meta = ChannelMeta::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::Empty(e) => {
                // Atom channel link is an attribute on an empty element
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "link" && !in_item(&stack) && meta.link.is_none() {
                    let mut href = None;
                    let mut alternate = true;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"href" => {
                                href = Some(String::from_utf8_lossy(&attr.value).into_owned())
                            }
                            b"rel" => alternate = attr.value.as_ref() == b"alternate",
                            _ => {}
                        }
                    }
                    if alternate {
                        meta.link = href;
                    }
                }
            }
            Event::Text(t) => {
                if in_item(&stack) {
                    continue;
                }
                let text = t.unescape()?.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
                match (parent, stack.last().map(String::as_str)) {
                    (Some("channel") | Some("feed"), Some("title")) => {
                        meta.title.get_or_insert(text);
                    }
                    (Some("channel"), Some("link")) => {
                        meta.link.get_or_insert(text);
                    }
                    (Some("channel"), Some("managingEditor" | "webMaster")) => {
                        let (email, name) = split_editor(&text);
                        if let Some(email) = email {
                            meta.email.get_or_insert(email);
                        }
                        if let Some(name) = name {
                            meta.author.get_or_insert(name);
                        }
                    }
                    (Some("author"), Some("name")) => {
                        meta.author.get_or_insert(text);
                    }
                    (Some("author"), Some("email")) => {
                        meta.email.get_or_insert(text);
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(meta)
}

fn in_item(stack: &[String]) -> bool {
    stack.iter().any(|name| name == "item" || name == "entry")
}

/// RSS editor fields come as `email (Display Name)`.
fn split_editor(raw: &str) -> (Option<String>, Option<String>) {
    match raw.split_once('(') {
        Some((email, rest)) => {
            let email = email.trim();
            let name = rest.trim_end_matches(')').trim();
            (
                (!email.is_empty()).then(|| email.to_string()),
                (!name.is_empty()).then(|| name.to_string()),
            )
        }
        None => {
            let email = raw.trim();
            ((!email.is_empty()).then(|| email.to_string()), None)
        }
    }
}
