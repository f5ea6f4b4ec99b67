//! Source id constants and the default quality ranking.

use crate::types::SourceId;

// Source names as they appear in config files and on the CLI
pub const RSS_SOURCE: &str = "rss";
pub const FEEDSPOT_SOURCE: &str = "feedspot";
pub const CURATED_LIST_SOURCE: &str = "curated_list";
pub const SUBSTACK_SOURCE: &str = "substack";

/// Default source quality order, highest first. The platform's own discovery
/// API is the most reliable about its publications, generic RSS channel
/// metadata the least.
pub const DEFAULT_SOURCE_PRIORITY: [SourceId; 4] = [
    SourceId::Substack,
    SourceId::CuratedList,
    SourceId::Feedspot,
    SourceId::Rss,
];

/// Get all supported source names
pub fn supported_sources() -> Vec<&'static str> {
    vec![
        RSS_SOURCE,
        FEEDSPOT_SOURCE,
        CURATED_LIST_SOURCE,
        SUBSTACK_SOURCE,
    ]
}
