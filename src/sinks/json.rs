use crate::error::Result;
use crate::pipeline::merge::CanonicalRecord;
use crate::pipeline::orchestrator::RunResult;
use crate::sinks::NewsletterSink;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Writes canonical records plus the run report as pretty-printed JSON.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl NewsletterSink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn write(&self, records: &[CanonicalRecord], result: &RunResult) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let document = json!({
            "run": result,
            "newsletters": records,
        });
        let content = serde_json::to_string_pretty(&document)?;
        fs::write(&self.path, content)?;

        info!(path = %self.path.display(), count = records.len(), "Wrote JSON output");
        Ok(())
    }
}
