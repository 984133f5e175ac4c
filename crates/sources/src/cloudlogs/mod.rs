//! Interval-polling cloud-logs source
//!
//! Polls a cloud log API for filtered events on a fixed interval and
//! resumes across restarts from a persisted ingestion-time watermark.
//! The concrete wire client stays outside the pipeline: the host
//! registers a [`LogsApi`] under [`LOGS_API_CLIENT`].
//!
//! Delivery is at-least-once: the watermark advances on ingestion time,
//! so events sharing the maximum ingestion time can be re-delivered
//! after a restart, and events ingested out of order behind the
//! watermark are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Value};
use stave_operator::helper::{BasicConfig, InputConfig, InputOperator, WriterConfig};
use stave_operator::{
    BoundaryError, BuildContext, Duration, Operator, OperatorBuilder, OperatorError, Result,
};
use stave_persist::ScopedPersister;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::StartAt;

#[cfg(test)]
#[path = "cloudlogs_test.rs"]
mod tests;

/// Boundary client name the source looks up at build time
pub const LOGS_API_CLIENT: &str = "cloud_logs_api";

/// Maximum events per page the API accepts
const MAX_EVENT_LIMIT: i64 = 10_000;

/// One fetch request against the log API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLogs {
    pub group: String,
    pub stream_names: Vec<String>,
    pub stream_prefix: Option<String>,
    pub start_time_ms: i64,
    pub limit: i64,
    pub next_token: Option<String>,
}

/// One event returned by the log API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    pub timestamp_ms: i64,
    pub ingestion_time_ms: i64,
    pub stream: String,
    pub event_id: String,
}

/// One page of events
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    pub next_token: Option<String>,
}

/// Wire client for a filtered log-events API
#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn fetch(&self, request: FetchLogs) -> std::result::Result<LogPage, BoundaryError>;
}

fn default_event_limit() -> i64 {
    MAX_EVENT_LIMIT
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

/// Configuration for the cloud-logs source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudLogsConfig {
    #[serde(flatten)]
    pub input: InputConfig,

    /// Log group to poll (required)
    #[serde(default)]
    pub log_group: String,

    /// Region the group lives in (required)
    #[serde(default)]
    pub region: String,

    /// Credential profile name
    #[serde(default)]
    pub profile: String,

    /// Exact stream names to filter on
    #[serde(default)]
    pub stream_names: Vec<String>,

    /// Stream name prefix to filter on; exclusive with `stream_names`
    #[serde(default)]
    pub stream_prefix: Option<String>,

    /// Events per page, 1 to 10000
    #[serde(default = "default_event_limit")]
    pub event_limit: i64,

    /// Poll interval, at least one second
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Where to start with an empty offset store
    #[serde(default)]
    pub start_at: StartAt,
}

impl CloudLogsConfig {
    /// Create a config with the given id, group, and region
    pub fn new(
        id: impl Into<String>,
        log_group: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            input: InputConfig::new(id, "cloud_logs_input"),
            log_group: log_group.into(),
            region: region.into(),
            profile: String::new(),
            stream_names: Vec::new(),
            stream_prefix: None,
            event_limit: default_event_limit(),
            poll_interval: default_poll_interval(),
            start_at: StartAt::default(),
        }
    }
}

impl Default for CloudLogsConfig {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl OperatorBuilder for CloudLogsConfig {
    fn basic(&self) -> &BasicConfig {
        &self.input.writer.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.input.writer.basic
    }

    fn writer(&self) -> Option<&WriterConfig> {
        Some(&self.input.writer)
    }

    fn writer_mut(&mut self) -> Option<&mut WriterConfig> {
        Some(&mut self.input.writer)
    }

    fn can_process(&self) -> bool {
        false
    }

    fn build(&self, context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        if self.log_group.is_empty() {
            return Err(OperatorError::config("missing required field 'log_group'"));
        }
        if self.region.is_empty() {
            return Err(OperatorError::config("missing required field 'region'"));
        }
        if !self.stream_names.is_empty() && self.stream_prefix.is_some() {
            return Err(OperatorError::config(
                "'stream_names' and 'stream_prefix' cannot both be set",
            ));
        }
        if !(1..=MAX_EVENT_LIMIT).contains(&self.event_limit) {
            return Err(OperatorError::config(format!(
                "invalid value '{}' for 'event_limit': must be between 1 and {MAX_EVENT_LIMIT}",
                self.event_limit
            )));
        }
        if self.poll_interval.raw() < std::time::Duration::from_secs(1) {
            return Err(OperatorError::config(format!(
                "invalid value '{}' for 'poll_interval': minimum is 1s",
                self.poll_interval
            )));
        }

        let api = context
            .boundary
            .get::<Arc<dyn LogsApi>>(LOGS_API_CLIENT)
            .ok_or_else(|| {
                OperatorError::config(format!(
                    "cloud_logs_input requires a '{LOGS_API_CLIENT}' boundary client"
                ))
            })?
            .clone();

        let input = self.input.build()?;
        let persister = context.scoped_persister(&input.writer.id());

        Ok(vec![Arc::new(CloudLogsInput {
            inner: Arc::new(CloudLogsInner {
                input,
                config: self.clone(),
                api,
                persister,
            }),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        })])
    }
}

struct CloudLogsInner {
    input: InputOperator,
    config: CloudLogsConfig,
    api: Arc<dyn LogsApi>,
    persister: ScopedPersister,
}

/// Operator that polls a cloud log API
pub struct CloudLogsInput {
    inner: Arc<CloudLogsInner>,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CloudLogsInner {
    /// The persisted watermark for this group, big-endian millis
    fn stored_watermark(&self) -> i64 {
        self.persister
            .get(self.config.log_group.as_bytes())
            .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
            .map(|arr| i64::from_be_bytes(arr))
            .unwrap_or(0)
    }

    fn store_watermark(&self, watermark: i64) {
        self.persister.set(
            self.config.log_group.as_bytes(),
            watermark.to_be_bytes().to_vec(),
        );
    }

    fn entry_for(&self, event: &LogEvent) -> Entry {
        let record: Value = [
            ("message".to_owned(), Value::from(event.message.as_str())),
            (
                "ingestion_time".to_owned(),
                Value::Int(event.ingestion_time_ms),
            ),
        ]
        .into_iter()
        .collect();

        let mut entry = self.input.new_entry(record);
        entry.add_resource_key("log_group", self.config.log_group.clone());
        entry.add_resource_key("region", self.config.region.clone());
        entry.add_resource_key("log_stream", event.stream.clone());
        entry.add_resource_key("event_id", event.event_id.clone());
        if let Some(ts) = DateTime::from_timestamp_millis(event.timestamp_ms) {
            entry.timestamp = ts;
        }
        entry
    }
}

#[async_trait]
impl Operator for CloudLogsInput {
    fn id(&self) -> String {
        self.inner.input.writer.id()
    }

    fn operator_type(&self) -> &str {
        self.inner.input.writer.operator_type()
    }

    fn can_process(&self) -> bool {
        false
    }

    fn can_output(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        self.inner.persister.load()?;

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        *self.task.lock() = Some(tokio::spawn(poll_events(inner, token)));

        tracing::info!(
            operator_id = %self.id(),
            log_group = %self.inner.config.log_group,
            poll_interval = %self.inner.config.poll_interval,
            "cloud logs source started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(operator_id = %self.id(), error = %e, "poll task panicked");
            }
        }
        self.inner.persister.sync()?;
        tracing::info!(operator_id = %self.id(), "cloud logs source stopped");
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        self.inner.input.writer.outputs()
    }

    fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()> {
        self.inner.input.writer.set_outputs(candidates)
    }

    async fn process(&self, _entry: Entry) -> Result<()> {
        Err(OperatorError::ProcessingUnsupported(self.id()))
    }
}

async fn poll_events(inner: Arc<CloudLogsInner>, cancel: CancellationToken) {
    // Fetch immediately on start, then on every interval.
    loop {
        if let Err(e) = sweep(&inner, &cancel).await {
            tracing::warn!(
                log_group = %inner.config.log_group,
                error = %e,
                "failed to get events, retrying next interval"
            );
        }
        if let Err(e) = inner.persister.sync() {
            tracing::warn!(error = %e, "failed to sync offset database");
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.config.poll_interval.raw()) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

/// One full paginated fetch, advancing the watermark per event
async fn sweep(inner: &Arc<CloudLogsInner>, cancel: &CancellationToken) -> Result<()> {
    let mut watermark = inner.stored_watermark();
    if inner.config.start_at == StartAt::End && watermark == 0 {
        watermark = Utc::now().timestamp_millis();
        tracing::debug!(watermark, "empty offset store, starting at the current time");
    }

    let mut next_token: Option<String> = None;
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let page = inner
            .api
            .fetch(FetchLogs {
                group: inner.config.log_group.clone(),
                stream_names: inner.config.stream_names.clone(),
                stream_prefix: inner.config.stream_prefix.clone(),
                start_time_ms: watermark,
                limit: inner.config.event_limit,
                next_token: next_token.clone(),
            })
            .await?;

        if page.events.is_empty() {
            return Ok(());
        }

        for event in &page.events {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let entry = inner.entry_for(event);
            inner.input.write(entry).await;

            if event.ingestion_time_ms > watermark {
                watermark = event.ingestion_time_ms;
                inner.store_watermark(watermark);
            }
        }

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(()),
        }
    }
}
