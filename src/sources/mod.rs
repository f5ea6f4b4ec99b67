// Source adapters producing raw newsletter records

pub mod curated;
pub mod feedspot;
pub mod rss;
pub mod substack;

use crate::config::{Config, HttpConfig};
use crate::error::Result;
use crate::types::{NewsletterSource, SourceId};
use std::time::Duration;

/// Build the adapters enabled in the configuration, in configured order.
pub fn build_sources(config: &Config) -> Result<Vec<Box<dyn NewsletterSource>>> {
    let mut sources: Vec<Box<dyn NewsletterSource>> = Vec::new();
    for id in config.enabled_sources()? {
        sources.push(match id {
            SourceId::Rss => Box::new(rss::RssCrawler::new(&config.sources.rss, &config.http)?),
            SourceId::Feedspot => Box::new(feedspot::FeedspotCrawler::new(
                &config.sources.feedspot,
                &config.http,
            )?),
            SourceId::CuratedList => Box::new(curated::CuratedListCrawler::new(
                &config.sources.curated_list,
                &config.run.keywords,
                &config.http,
            )?),
            SourceId::Substack => Box::new(substack::SubstackCrawler::new(
                &config.sources.substack,
                &config.run.keywords,
                &config.http,
            )?),
        });
    }
    Ok(sources)
}

pub(crate) fn build_client(http: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&http.user_agent)
        .timeout(Duration::from_secs(http.timeout_seconds))
        .build()?;
    Ok(client)
}
