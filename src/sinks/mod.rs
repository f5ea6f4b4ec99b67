// Output sinks consuming the finalized canonical record stream

pub mod csv;
pub mod json;

use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::pipeline::merge::CanonicalRecord;
use crate::pipeline::orchestrator::RunResult;
use std::path::Path;

/// Consumes the finalized records plus the run report. Writes are
/// whole-file, so a rerun replaces rather than corrupts prior output.
#[async_trait::async_trait]
pub trait NewsletterSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write(&self, records: &[CanonicalRecord], result: &RunResult) -> Result<()>;
}

/// Build the sinks configured under `[output]`.
pub fn build_sinks(config: &Config) -> Result<Vec<Box<dyn NewsletterSink>>> {
    let dir = Path::new(&config.output.dir);
    let mut sinks: Vec<Box<dyn NewsletterSink>> = Vec::new();
    for format in &config.output.formats {
        match format.as_str() {
            "csv" => sinks.push(Box::new(self::csv::CsvSink::new(dir.join("newsletters.csv")))),
            "json" => sinks.push(Box::new(self::json::JsonSink::new(
                dir.join("newsletters.json"),
            ))),
            other => {
                return Err(ScraperError::Config(format!(
                    "Unknown output format '{}'",
                    other
                )))
            }
        }
    }
    Ok(sinks)
}
