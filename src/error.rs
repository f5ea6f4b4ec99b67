use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source {source_name} unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("Source {source_name} timed out after {seconds}s")]
    SourceTimeout { source_name: String, seconds: u64 },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Sink {sink} write failed: {message}")]
    SinkWriteFailed { sink: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error: {message}")]
    Api { message: String },
}

pub type Result<T> = std::result::Result<T, ScraperError>;
