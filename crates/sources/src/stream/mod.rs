//! Partitioned event-stream source
//!
//! Consumes a partitioned event bus with one background task per
//! partition, each resuming from its own persisted offset. The wire
//! client stays outside the pipeline: the host registers an
//! [`EventStream`] under [`EVENT_STREAM_CLIENT`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Value};
use stave_operator::helper::{BasicConfig, InputConfig, InputOperator, WriterConfig};
use stave_operator::{
    BoundaryError, BuildContext, Operator, OperatorBuilder, OperatorError, Result,
};
use stave_persist::ScopedPersister;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::StartAt;

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;

/// Boundary client name the source looks up at build time
pub const EVENT_STREAM_CLIENT: &str = "event_stream";

/// Where a partition subscription begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPosition {
    /// The oldest retained event
    Earliest,
    /// Only events enqueued after subscribing
    Latest,
    /// Resume just past a stored offset
    Offset(String),
}

/// One event from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub body: Vec<u8>,
    pub offset: String,
    pub sequence: i64,
    pub enqueued_ms: i64,
    pub partition: String,
    pub properties: BTreeMap<String, String>,
}

/// Wire client for a partitioned event bus
#[async_trait]
pub trait EventStream: Send + Sync {
    /// List the partition ids of the stream
    async fn partitions(&self) -> std::result::Result<Vec<String>, BoundaryError>;

    /// Subscribe to one partition from the given position
    ///
    /// Events arrive on the returned channel until the subscription is
    /// dropped.
    async fn receive(
        &self,
        partition: &str,
        from: StreamPosition,
    ) -> std::result::Result<mpsc::Receiver<StreamEvent>, BoundaryError>;

    /// Close the client connection
    async fn close(&self) -> std::result::Result<(), BoundaryError>;
}

fn default_prefetch() -> u32 {
    1000
}

/// Configuration for the event-stream source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStreamConfig {
    #[serde(flatten)]
    pub input: InputConfig,

    /// Bus namespace (required)
    #[serde(default)]
    pub namespace: String,

    /// Stream name (required)
    #[serde(default)]
    pub name: String,

    /// Consumer group (required)
    #[serde(default)]
    pub group: String,

    /// Connection string or endpoint handed to the client (required)
    #[serde(default)]
    pub connection: String,

    /// Events prefetched per partition, at least 1
    #[serde(default = "default_prefetch")]
    pub prefetch_count: u32,

    /// Where to start when no offset is stored
    #[serde(default)]
    pub start_at: StartAt,
}

impl EventStreamConfig {
    /// Create a config with the given id and stream coordinates
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            input: InputConfig::new(id, "event_stream_input"),
            namespace: namespace.into(),
            name: name.into(),
            group: group.into(),
            connection: String::new(),
            prefetch_count: default_prefetch(),
            start_at: StartAt::default(),
        }
    }
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self::new("", "", "", "")
    }
}

impl OperatorBuilder for EventStreamConfig {
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
        for (field, value) in [
            ("namespace", &self.namespace),
            ("name", &self.name),
            ("group", &self.group),
            ("connection", &self.connection),
        ] {
            if value.is_empty() {
                return Err(OperatorError::config(format!(
                    "missing required field '{field}'"
                )));
            }
        }
        if self.prefetch_count < 1 {
            return Err(OperatorError::config(format!(
                "invalid value '{}' for 'prefetch_count'",
                self.prefetch_count
            )));
        }

        let client = context
            .boundary
            .get::<Arc<dyn EventStream>>(EVENT_STREAM_CLIENT)
            .ok_or_else(|| {
                OperatorError::config(format!(
                    "event_stream_input requires a '{EVENT_STREAM_CLIENT}' boundary client"
                ))
            })?
            .clone();

        let input = self.input.build()?;
        let persister = context.scoped_persister(&input.writer.id());

        Ok(vec![Arc::new(EventStreamInput {
            inner: Arc::new(StreamInner {
                input,
                config: self.clone(),
                client,
                persister,
            }),
            cancel: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })])
    }
}

struct StreamInner {
    input: InputOperator,
    config: EventStreamConfig,
    client: Arc<dyn EventStream>,
    persister: ScopedPersister,
}

/// Operator that consumes a partitioned event bus
pub struct EventStreamInput {
    inner: Arc<StreamInner>,
    cancel: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamInner {
    fn offset_key(&self, partition: &str) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}",
            self.config.namespace, self.config.name, self.config.group, partition
        )
        .into_bytes()
    }

    fn stored_offset(&self, partition: &str) -> Option<String> {
        self.persister
            .get(&self.offset_key(partition))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .filter(|offset| !offset.is_empty())
    }

    /// Position selection: a stored offset wins; otherwise `start_at`
    /// decides. `beginning` always re-reads from the earliest event.
    fn position_for(&self, partition: &str) -> StreamPosition {
        if self.config.start_at == StartAt::Beginning {
            return StreamPosition::Earliest;
        }
        match self.stored_offset(partition) {
            Some(offset) => StreamPosition::Offset(offset),
            None => StreamPosition::Latest,
        }
    }

    fn entry_for(&self, event: &StreamEvent) -> Entry {
        let body = match std::str::from_utf8(&event.body) {
            Ok(text) => Value::from(text),
            Err(_) => Value::Bytes(event.body.clone()),
        };
        let mut record: BTreeMap<String, Value> = BTreeMap::new();
        record.insert("message".to_owned(), body);
        record.insert("offset".to_owned(), Value::from(event.offset.as_str()));
        record.insert("sequence".to_owned(), Value::Int(event.sequence));
        record.insert("partition".to_owned(), Value::from(event.partition.as_str()));
        if let Some(ts) = DateTime::from_timestamp_millis(event.enqueued_ms) {
            record.insert("enqueued_time".to_owned(), Value::Timestamp(ts));
        }
        if !event.properties.is_empty() {
            record.insert(
                "properties".to_owned(),
                event
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            );
        }

        let mut entry = self.input.new_entry(Value::Map(record));
        entry.add_resource_key("namespace", self.config.namespace.clone());
        entry.add_resource_key("name", self.config.name.clone());
        entry.add_resource_key("group", self.config.group.clone());
        entry
    }
}

#[async_trait]
impl Operator for EventStreamInput {
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

        let partitions = self.inner.client.partitions().await?;
        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let mut tasks = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let position = self.inner.position_for(&partition);
            let receiver = self.inner.client.receive(&partition, position).await?;
            let inner = Arc::clone(&self.inner);
            let task_token = token.clone();
            tasks.push(tokio::spawn(consume_partition(
                inner, partition, receiver, task_token,
            )));
        }
        *self.tasks.lock() = tasks;

        tracing::info!(
            operator_id = %self.id(),
            name = %self.inner.config.name,
            "event stream source started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(operator_id = %self.id(), error = %e, "consumer task panicked");
            }
        }
        self.inner.client.close().await?;
        self.inner.persister.sync()?;
        tracing::info!(operator_id = %self.id(), "event stream source stopped");
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

async fn consume_partition(
    inner: Arc<StreamInner>,
    partition: String,
    mut receiver: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = receiver.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::debug!(partition = %partition, "partition subscription closed");
                    return;
                }
            },
            _ = cancel.cancelled() => return,
        };

        let entry = inner.entry_for(&event);
        inner.input.write(entry).await;

        // The offset is checkpointed only after a successful write so a
        // crash re-delivers rather than skips.
        inner
            .persister
            .set(&inner.offset_key(&partition), event.offset.into_bytes());
    }
}
