use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::layout::LogFileTarget;
use crate::security::clock::Clock;
use crate::security::token_cache::Authenticator;
use crate::transport::event_log::EventLogDownloader;
use crate::transport::query::{resolve_query_input, QueryClient};
use crate::transport::EventLogRecord;

/// Outcome of a download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl DownloadSummary {
    fn merge(&mut self, other: &DownloadSummary) {
        self.downloaded += other.downloaded;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

/// Where downloads go and how event types map to directories.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub download_root: PathBuf,
    pub event_types: BTreeMap<String, String>,
}

/// Runs queries and downloads every referenced log file.
pub struct EventLogSync<'a, A, C> {
    query: &'a QueryClient<A, C>,
    downloader: &'a EventLogDownloader,
    plan: &'a DownloadPlan,
}

impl<'a, A: Authenticator, C: Clock> EventLogSync<'a, A, C> {
    pub fn new(
        query: &'a QueryClient<A, C>,
        downloader: &'a EventLogDownloader,
        plan: &'a DownloadPlan,
    ) -> Self {
        Self {
            query,
            downloader,
            plan,
        }
    }

    /// Process every `(event_type, query)` pair in order.
    /// A failing query aborts; failing record downloads are counted and skipped.
    pub async fn run_all(&self, pairs: &BTreeMap<String, String>) -> Result<DownloadSummary> {
        let mut total = DownloadSummary::default();
        for (event_type, query_input) in pairs {
            info!(event_type = %event_type, query = %query_input, "processing event type");
            let summary = self.run(event_type, query_input).await?;
            total.merge(&summary);
        }
        Ok(total)
    }

    /// Query for log records and download each one into the sprint tree.
    pub async fn run(&self, event_type: &str, query_input: &str) -> Result<DownloadSummary> {
        let soql = resolve_query_input(query_input)
            .with_context(|| format!("reading query for {event_type}"))?;
        let (records, _) = self
            .query
            .execute_all(&soql)
            .await
            .with_context(|| format!("querying log files for {event_type}"))?;

        let mut summary = DownloadSummary::default();
        for raw in records {
            let record = match parse_record(raw) {
                Some(r) => r,
                None => {
                    summary.failed += 1;
                    continue;
                }
            };

            match self.download_record(&record).await {
                Ok((path, bytes)) => {
                    info!(record_id = %record.id, path = %path.display(), bytes, "downloaded");
                    summary.downloaded += 1;
                    summary.bytes += bytes;
                }
                Err(e) => {
                    error!(record_id = %record.id, error = %format!("{e:#}"), "download failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            event_type = %event_type,
            downloaded = summary.downloaded,
            failed = summary.failed,
            "event type finished"
        );
        Ok(summary)
    }

    async fn download_record(&self, record: &EventLogRecord) -> Result<(PathBuf, u64)> {
        let target = LogFileTarget::resolve(
            &self.plan.download_root,
            &self.plan.event_types,
            &record.log_date,
            &record.event_type,
        );
        tokio::fs::create_dir_all(&target.directory)
            .await
            .with_context(|| format!("creating {}", target.directory.display()))?;

        let token = self.query.tokens().get_token().await?;
        let path = target.path();
        let bytes = self.downloader.download(&token, &record.id, &path).await?;
        Ok((path, bytes))
    }
}

fn parse_record(raw: Value) -> Option<EventLogRecord> {
    match serde_json::from_value::<EventLogRecord>(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "skipping record without Id, LogDate or EventType");
            None
        }
    }
}
