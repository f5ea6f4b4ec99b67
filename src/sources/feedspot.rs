//! Directory adapter: scrapes a Feedspot-style blog directory page.

use crate::config::{FeedspotSourceConfig, HttpConfig};
use crate::error::{Result, ScraperError};
use crate::types::{
    NewsletterSource, RawRecord, SourceId, FIELD_EMAIL, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER,
    FIELD_SOCIAL_MEDIA,
};
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{info, instrument};

pub struct FeedspotCrawler {
    client: reqwest::Client,
    url: String,
}

impl FeedspotCrawler {
    pub fn new(config: &FeedspotSourceConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: crate::sources::build_client(http)?,
            url: config.url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl NewsletterSource for FeedspotCrawler {
    fn source_id(&self) -> SourceId {
        SourceId::Feedspot
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ScraperError::Api {
                message: format!("directory page returned status {}", response.status()),
            });
        }
        let html = response.text().await?;

        let records = parse_directory(&html);
        info!(count = records.len(), "Collected directory records");
        Ok(records)
    }
}

fn parse_directory(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("div.blog-list-container div.blog-list").unwrap();
    let name_selector = Selector::parse("div.blog-name a").unwrap();
    let publisher_selector = Selector::parse("div.blog-desc i").unwrap();
    let contact_selector = Selector::parse("div.blog-contact a").unwrap();

    let mut records = Vec::new();
    for item in document.select(&item_selector) {
        let Some(name_elem) = item.select(&name_selector).next() else {
            continue;
        };

        let mut record = RawRecord::new(SourceId::Feedspot);
        let name = name_elem.text().collect::<String>();
        record.set_field(FIELD_NAME, json!(name.trim()));
        if let Some(href) = name_elem.value().attr("href") {
            record.set_field(FIELD_LINK, json!(href));
        }

        if let Some(publisher_elem) = item.select(&publisher_selector).next() {
            let publisher = publisher_elem.text().collect::<String>();
            record.set_field(FIELD_PUBLISHER, json!(publisher.trim()));
        }

        // Contact anchors mix a mailto with social profile links
        let mut social = Vec::new();
        for anchor in item.select(&contact_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(email) = href.strip_prefix("mailto:") {
                record.set_field(FIELD_EMAIL, json!(email));
            } else {
                social.push(href.to_string());
            }
        }
        if !social.is_empty() {
            record.set_field(FIELD_SOCIAL_MEDIA, json!(social));
        }

        // Directory pages carry no subscriber counts; the field stays absent
        if record.fields.contains_key(FIELD_NAME) || record.fields.contains_key(FIELD_LINK) {
            records.push(record);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY_HTML: &str = r#"
        <div class="blog-list-container">
          <div class="blog-list">
            <div class="blog-name"><a href="https://copyletter.example.com/">Copy Letter</a></div>
            <div class="blog-desc"><i>Jane Roe</i></div>
            <div class="blog-contact">
              <a href="mailto:jane@copyletter.example.com">email</a>
              <a href="https://twitter.com/copyletter">tw</a>
            </div>
          </div>
          <div class="blog-list">
            <div class="blog-name"><a href="https://other.example.com/">Other Letter</a></div>
          </div>
          <div class="blog-list">
            <div class="blog-desc"><i>No name entry is skipped</i></div>
          </div>
        </div>"#;

    #[test]
    fn directory_entries_become_raw_records() {
        let records = parse_directory(DIRECTORY_HTML);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.fields[FIELD_NAME], json!("Copy Letter"));
        assert_eq!(first.fields[FIELD_LINK], json!("https://copyletter.example.com/"));
        assert_eq!(first.fields[FIELD_PUBLISHER], json!("Jane Roe"));
        assert_eq!(first.fields[FIELD_EMAIL], json!("jane@copyletter.example.com"));
        assert_eq!(
            first.fields[FIELD_SOCIAL_MEDIA],
            json!(["https://twitter.com/copyletter"])
        );
        assert!(!first.fields.contains_key(crate::types::FIELD_SUBSCRIBERS));
    }

    #[test]
    fn entries_without_contacts_have_no_email_field() {
        let records = parse_directory(DIRECTORY_HTML);
        assert!(!records[1].fields.contains_key(FIELD_EMAIL));
    }
}
