use crate::error::Result;
use crate::pipeline::merge::CanonicalRecord;
use crate::pipeline::orchestrator::RunResult;
use crate::sinks::NewsletterSink;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Writes canonical records to a flat CSV file.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl NewsletterSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn write(&self, records: &[CanonicalRecord], _result: &RunResult) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut writer = ::csv::Writer::from_path(&self.path)?;
        writer.write_record([
            "name",
            "link",
            "publisher",
            "email",
            "subscribers",
            "social_media",
            "complete",
        ])?;

        for record in records {
            let subscribers = record
                .subscriber_count
                .map(|n| n.to_string())
                .unwrap_or_default();
            let social = record
                .social_accounts
                .iter()
                .map(|(platform, handle)| format!("{}: {}", platform, handle))
                .collect::<Vec<_>>()
                .join(" | ");
            writer.write_record([
                record.name.as_deref().unwrap_or(""),
                record.link.as_deref().unwrap_or(""),
                record.publisher.as_deref().unwrap_or(""),
                record.email.as_deref().unwrap_or(""),
                subscribers.as_str(),
                social.as_str(),
                if record.is_complete { "yes" } else { "no" },
            ])?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), count = records.len(), "Wrote CSV output");
        Ok(())
    }
}
