//! Pipeline orchestrator: fetch concurrently, merge deterministically,
//! filter, write.
//!
//! Adapters are independent I/O-bound units and run concurrently under a
//! bounded limit. All raw records are buffered before merging; the merge
//! itself runs single-threaded in configured source order, so the canonical
//! output never depends on fetch completion timing.

use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::pipeline::completeness::{self, EmailVerifier, RunPolicy, SyntaxEmailVerifier};
use crate::pipeline::identity;
use crate::pipeline::merge::{CanonicalRecord, MergeEngine, SourceRanking};
use crate::pipeline::normalize;
use crate::sinks::NewsletterSink;
use crate::types::{NewsletterSource, RawRecord, SourceId};
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Aggregate counts for one pipeline run.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RunResult {
    /// Raw records seen per source
    pub records_seen: BTreeMap<String, usize>,
    /// Sources that contributed nothing, with the failure reason
    pub failed_sources: BTreeMap<String, String>,
    /// Raw records dropped because normalization found nothing to identify
    pub malformed_records: usize,
    /// Distinct newsletters after merging
    pub canonical_records: usize,
    pub records_kept: usize,
    pub dropped_incomplete: usize,
    pub duration_seconds: f64,
}

pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build adapters and sinks from the configuration and run the pipeline.
    pub async fn run(&self) -> Result<RunResult> {
        self.config.validate()?;
        let sources = crate::sources::build_sources(&self.config)?;
        let sinks = crate::sinks::build_sinks(&self.config)?;
        self.run_with(sources, sinks).await
    }

    /// Run the pipeline over explicit adapters and sinks.
    #[instrument(skip_all)]
    pub async fn run_with(
        &self,
        sources: Vec<Box<dyn NewsletterSource>>,
        sinks: Vec<Box<dyn NewsletterSink>>,
    ) -> Result<RunResult> {
        self.config.validate()?;
        let started = std::time::Instant::now();
        let mut result = RunResult::default();
        counter!("newsletter_pipeline_runs_total").increment(1);

        // Phase 1: fetch all adapters concurrently, bounded.
        info!("Fetching from {} sources", sources.len());
        let timeout_seconds = self.config.run.source_timeout_seconds;
        let fetched: Vec<(SourceId, Result<Vec<RawRecord>>)> = stream::iter(sources)
            .map(|source| async move {
                let id = source.source_id();
                let outcome = fetch_source(source.as_ref(), timeout_seconds).await;
                (id, outcome)
            })
            .buffer_unordered(self.config.run.concurrency)
            .collect()
            .await;

        let mut batches: HashMap<SourceId, Vec<RawRecord>> = HashMap::new();
        for (source_id, outcome) in fetched {
            match outcome {
                Ok(records) => {
                    info!(source = %source_id, count = records.len(), "Source fetch complete");
                    counter!("newsletter_records_seen_total", "source" => source_id.as_str())
                        .increment(records.len() as u64);
                    result
                        .records_seen
                        .insert(source_id.to_string(), records.len());
                    batches.insert(source_id, records);
                }
                Err(e) => {
                    warn!(source = %source_id, error = %e, "Source failed, continuing without it");
                    counter!("newsletter_source_failures_total", "source" => source_id.as_str())
                        .increment(1);
                    result
                        .failed_sources
                        .insert(source_id.to_string(), e.to_string());
                }
            }
        }

        // Phase 2: merge single-threaded, iterating sources in configured
        // order so equal-priority ties resolve the same way every run.
        let ranking = SourceRanking::from_priority(&self.config.source_priority()?);
        let mut engine = MergeEngine::new(ranking);
        for source_id in self.config.enabled_sources()? {
            let Some(records) = batches.remove(&source_id) else {
                continue;
            };
            for raw in records {
                match normalize::normalize(&raw) {
                    Ok(fields) => match identity::resolve(&fields) {
                        Some(key) => engine.merge(key, fields, raw.source_id),
                        None => {
                            debug!(source = %raw.source_id, "Record has no identity, dropped");
                            result.malformed_records += 1;
                        }
                    },
                    Err(e) => {
                        debug!(source = %raw.source_id, error = %e, "Malformed record dropped");
                        result.malformed_records += 1;
                    }
                }
            }
        }
        result.canonical_records = engine.len();
        info!(
            canonical = result.canonical_records,
            malformed = result.malformed_records,
            "Merge complete"
        );

        // Phase 3: completeness policy and limit over the frozen records.
        let policy = RunPolicy {
            complete_only: self.config.run.complete_only,
        };
        let verifier: Option<Box<dyn EmailVerifier>> = if self.config.run.skip_email_verification {
            None
        } else {
            Some(Box::new(SyntaxEmailVerifier))
        };

        let mut kept = Vec::new();
        for record in engine.into_records() {
            if let Some(limit) = self.config.run.limit {
                if kept.len() >= limit {
                    break;
                }
            }
            if completeness::keep(&record, &policy, verifier.as_deref()) {
                kept.push(record);
            } else {
                result.dropped_incomplete += 1;
            }
        }
        result.records_kept = kept.len();
        counter!("newsletter_records_kept_total").increment(kept.len() as u64);
        counter!("newsletter_records_dropped_total").increment(result.dropped_incomplete as u64);

        result.duration_seconds = started.elapsed().as_secs_f64();
        histogram!("newsletter_pipeline_duration_seconds").record(result.duration_seconds);

        // Phase 4: hand the finalized records to every sink. A sink failure
        // fails the run; the caller's artifact was not produced.
        for sink in &sinks {
            write_to_sink(sink.as_ref(), &kept, &result).await?;
        }
        info!(
            kept = result.records_kept,
            dropped = result.dropped_incomplete,
            failed_sources = result.failed_sources.len(),
            "Pipeline run complete"
        );

        Ok(result)
    }
}

/// Fetch one adapter under the configured budget, mapping every failure into
/// the source-failure taxonomy so the orchestrator can isolate it.
async fn fetch_source(
    source: &dyn NewsletterSource,
    timeout_seconds: u64,
) -> Result<Vec<RawRecord>> {
    let id = source.source_id();
    match tokio::time::timeout(Duration::from_secs(timeout_seconds), source.collect()).await {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(e @ ScraperError::SourceUnavailable { .. })) => Err(e),
        Ok(Err(e @ ScraperError::SourceTimeout { .. })) => Err(e),
        Ok(Err(e)) => Err(ScraperError::SourceUnavailable {
            source_name: id.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(ScraperError::SourceTimeout {
            source_name: id.to_string(),
            seconds: timeout_seconds,
        }),
    }
}

async fn write_to_sink(
    sink: &dyn NewsletterSink,
    records: &[CanonicalRecord],
    result: &RunResult,
) -> Result<()> {
    info!(sink = sink.name(), count = records.len(), "Writing output");
    sink.write(records, result)
        .await
        .map_err(|e| match e {
            e @ ScraperError::SinkWriteFailed { .. } => e,
            other => ScraperError::SinkWriteFailed {
                sink: sink.name().to_string(),
                message: other.to_string(),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FIELD_EMAIL, FIELD_LINK, FIELD_NAME, FIELD_PUBLISHER, FIELD_SUBSCRIBERS};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct StaticSource {
        id: SourceId,
        records: Vec<RawRecord>,
    }

    #[async_trait]
    impl NewsletterSource for StaticSource {
        fn source_id(&self) -> SourceId {
            self.id
        }

        async fn collect(&self) -> Result<Vec<RawRecord>> {
            Ok(self.records.clone())
        }
    }

    struct FailingSource {
        id: SourceId,
    }

    #[async_trait]
    impl NewsletterSource for FailingSource {
        fn source_id(&self) -> SourceId {
            self.id
        }

        async fn collect(&self) -> Result<Vec<RawRecord>> {
            Err(ScraperError::SourceTimeout {
                source_name: self.id.to_string(),
                seconds: 1,
            })
        }
    }

    struct CapturingSink {
        records: Arc<Mutex<Vec<CanonicalRecord>>>,
    }

    #[async_trait]
    impl NewsletterSink for CapturingSink {
        fn name(&self) -> &'static str {
            "capture"
        }

        async fn write(&self, records: &[CanonicalRecord], _result: &RunResult) -> Result<()> {
            self.records.lock().await.extend_from_slice(records);
            Ok(())
        }
    }

    fn raw(source: SourceId, link: &str, fields: &[(&str, serde_json::Value)]) -> RawRecord {
        let mut record = RawRecord::new(source);
        record.set_field(FIELD_LINK, json!(link));
        for (key, value) in fields {
            record.set_field(key, value.clone());
        }
        record
    }

    fn complete_raw(source: SourceId, link: &str) -> RawRecord {
        raw(
            source,
            link,
            &[
                (FIELD_NAME, json!("Letters")),
                (FIELD_PUBLISHER, json!("Jane Roe")),
                (FIELD_EMAIL, json!("jane@example.com")),
                (FIELD_SUBSCRIBERS, json!("4.2k")),
            ],
        )
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.sources.enabled = vec!["rss".to_string(), "feedspot".to_string()];
        config
    }

    async fn run_capturing(
        config: Config,
        sources: Vec<Box<dyn NewsletterSource>>,
    ) -> (RunResult, Vec<CanonicalRecord>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = CapturingSink {
            records: captured.clone(),
        };
        let orchestrator = Orchestrator::new(config);
        let result = orchestrator
            .run_with(sources, vec![Box::new(sink)])
            .await
            .unwrap();
        let records = captured.lock().await.clone();
        (result, records)
    }

    #[tokio::test]
    async fn records_from_different_sources_merge_by_link() {
        let sources: Vec<Box<dyn NewsletterSource>> = vec![
            Box::new(StaticSource {
                id: SourceId::Rss,
                records: vec![raw(
                    SourceId::Rss,
                    "https://example.com/n",
                    &[(FIELD_NAME, json!("Letters"))],
                )],
            }),
            Box::new(StaticSource {
                id: SourceId::Feedspot,
                records: vec![raw(
                    SourceId::Feedspot,
                    "https://example.com/n/",
                    &[(FIELD_PUBLISHER, json!("Jane Roe"))],
                )],
            }),
        ];

        let (result, records) = run_capturing(test_config(), sources).await;
        assert_eq!(result.canonical_records, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Letters"));
        assert_eq!(records[0].publisher.as_deref(), Some("Jane Roe"));
    }

    #[tokio::test]
    async fn one_failed_source_does_not_abort_the_run() {
        let mut config = Config::default();
        config.sources.enabled = vec![
            "rss".to_string(),
            "feedspot".to_string(),
            "substack".to_string(),
        ];

        let sources: Vec<Box<dyn NewsletterSource>> = vec![
            Box::new(StaticSource {
                id: SourceId::Rss,
                records: vec![complete_raw(SourceId::Rss, "https://a.com/n")],
            }),
            Box::new(FailingSource {
                id: SourceId::Feedspot,
            }),
            Box::new(StaticSource {
                id: SourceId::Substack,
                records: vec![complete_raw(SourceId::Substack, "https://b.com/n")],
            }),
        ];

        let (result, records) = run_capturing(config, sources).await;
        assert_eq!(records.len(), 2);
        assert_eq!(result.failed_sources.len(), 1);
        assert!(result.failed_sources.contains_key("feedspot"));
    }

    #[tokio::test]
    async fn complete_only_drops_and_counts_incomplete_records() {
        let mut config = test_config();
        config.run.complete_only = true;

        let sources: Vec<Box<dyn NewsletterSource>> = vec![Box::new(StaticSource {
            id: SourceId::Rss,
            records: vec![
                complete_raw(SourceId::Rss, "https://a.com/n"),
                // no subscriber count: incomplete
                raw(
                    SourceId::Rss,
                    "https://b.com/n",
                    &[
                        (FIELD_NAME, json!("Other")),
                        (FIELD_PUBLISHER, json!("Jo")),
                        (FIELD_EMAIL, json!("jo@b.com")),
                    ],
                ),
            ],
        })];

        let (result, records) = run_capturing(config, sources).await;
        assert_eq!(records.len(), 1);
        assert_eq!(result.dropped_incomplete, 1);
        assert!(records[0].is_complete);
    }

    #[tokio::test]
    async fn malformed_records_are_counted_not_propagated() {
        let mut bad = RawRecord::new(SourceId::Rss);
        bad.set_field(FIELD_EMAIL, json!("only@email.com"));

        let sources: Vec<Box<dyn NewsletterSource>> = vec![Box::new(StaticSource {
            id: SourceId::Rss,
            records: vec![bad, complete_raw(SourceId::Rss, "https://a.com/n")],
        })];

        let (result, records) = run_capturing(test_config(), sources).await;
        assert_eq!(result.malformed_records, 1);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn limit_caps_kept_records() {
        let mut config = test_config();
        config.run.limit = Some(1);

        let sources: Vec<Box<dyn NewsletterSource>> = vec![Box::new(StaticSource {
            id: SourceId::Rss,
            records: vec![
                complete_raw(SourceId::Rss, "https://a.com/n"),
                complete_raw(SourceId::Rss, "https://b.com/n"),
            ],
        })];

        let (result, records) = run_capturing(config, sources).await;
        assert_eq!(records.len(), 1);
        assert_eq!(result.canonical_records, 2);
    }

    #[tokio::test]
    async fn failing_sink_fails_the_run() {
        struct FailingSink;

        #[async_trait]
        impl NewsletterSink for FailingSink {
            fn name(&self) -> &'static str {
                "broken"
            }

            async fn write(
                &self,
                _records: &[CanonicalRecord],
                _result: &RunResult,
            ) -> Result<()> {
                Err(ScraperError::Api {
                    message: "disk full".to_string(),
                })
            }
        }

        let sources: Vec<Box<dyn NewsletterSource>> = vec![Box::new(StaticSource {
            id: SourceId::Rss,
            records: vec![complete_raw(SourceId::Rss, "https://a.com/n")],
        })];

        let orchestrator = Orchestrator::new(test_config());
        let outcome = orchestrator
            .run_with(sources, vec![Box::new(FailingSink)])
            .await;
        match outcome {
            Err(ScraperError::SinkWriteFailed { sink, .. }) => assert_eq!(sink, "broken"),
            other => panic!("expected SinkWriteFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn identical_input_yields_identical_output() {
        let build_sources = || -> Vec<Box<dyn NewsletterSource>> {
            vec![
                Box::new(StaticSource {
                    id: SourceId::Rss,
                    records: vec![
                        complete_raw(SourceId::Rss, "https://a.com/n"),
                        raw(
                            SourceId::Rss,
                            "https://b.com/n",
                            &[(FIELD_NAME, json!("Other"))],
                        ),
                    ],
                }),
                Box::new(StaticSource {
                    id: SourceId::Feedspot,
                    records: vec![raw(
                        SourceId::Feedspot,
                        "https://a.com/n",
                        &[(FIELD_PUBLISHER, json!("Directory Publisher"))],
                    )],
                }),
            ]
        };

        let (_, first) = run_capturing(test_config(), build_sources()).await;
        let (_, second) = run_capturing(test_config(), build_sources()).await;

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }
}
