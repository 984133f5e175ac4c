//! Bulk sink
//!
//! Buffered delivery to a bulk-index style endpoint. The wire client
//! lives outside the pipeline: the host registers a [`BulkApi`]
//! implementation under [`BULK_API_CLIENT`] in the build context's
//! boundary clients, and the sink drives it through the shared buffer
//! (chunking, retry with backoff, backpressure, shutdown flush).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;
use stave_operator::helper::{BasicConfig, OutputConfig, OutputOperator};
use stave_operator::{
    BoundaryError, Buffer, BufferConfig, BufferHandler, BufferType, BuildContext, Duration,
    Operator, OperatorBuilder, OperatorError, Result,
};

#[cfg(test)]
#[path = "bulk_test.rs"]
mod tests;

/// Boundary client name the bulk sink looks up at build time
pub const BULK_API_CLIENT: &str = "bulk_api";

/// Wire client for a bulk-index endpoint
#[async_trait]
pub trait BulkApi: Send + Sync {
    /// Deliver one batch; transient failures are retried by the buffer
    async fn send(&self, entries: &[Entry]) -> std::result::Result<(), BoundaryError>;
}

/// Configuration for the bulk sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOutputConfig {
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Batch buffer settings
    #[serde(default)]
    pub buffer: BufferConfig,

    /// How long `stop` waits for the final flush
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout: Duration,
}

fn default_flush_timeout() -> Duration {
    Duration::from_secs(10)
}

impl BulkOutputConfig {
    /// Create a config with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            output: OutputConfig::new(id, "bulk_output"),
            buffer: BufferConfig::default(),
            flush_timeout: default_flush_timeout(),
        }
    }
}

impl Default for BulkOutputConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl OperatorBuilder for BulkOutputConfig {
    fn basic(&self) -> &BasicConfig {
        &self.output.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.output.basic
    }

    fn build(&self, context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        let api = context
            .boundary
            .get::<Arc<dyn BulkApi>>(BULK_API_CLIENT)
            .ok_or_else(|| {
                OperatorError::config(format!(
                    "bulk_output requires a '{BULK_API_CLIENT}' boundary client"
                ))
            })?
            .clone();

        let output = self.output.build()?;
        let persister = match self.buffer.buffer_type {
            BufferType::Disk => Some(context.scoped_persister(&output.id())),
            BufferType::Memory => None,
        };
        let buffer = Buffer::new(self.buffer.clone(), persister)?;

        Ok(vec![Arc::new(BulkOutput {
            output,
            api,
            buffer,
            flush_timeout: self.flush_timeout,
        })])
    }
}

/// Sink that batches entries through the buffer into a bulk endpoint
pub struct BulkOutput {
    output: OutputOperator,
    api: Arc<dyn BulkApi>,
    buffer: Buffer,
    flush_timeout: Duration,
}

struct ApiHandler {
    api: Arc<dyn BulkApi>,
}

#[async_trait]
impl BufferHandler for ApiHandler {
    async fn process_multi(&self, entries: Vec<Entry>) -> std::result::Result<(), BoundaryError> {
        self.api.send(&entries).await
    }
}

#[async_trait]
impl Operator for BulkOutput {
    fn id(&self) -> String {
        self.output.id()
    }

    fn operator_type(&self) -> &str {
        self.output.operator_type()
    }

    fn can_process(&self) -> bool {
        true
    }

    fn can_output(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<()> {
        self.buffer.start(Arc::new(ApiHandler {
            api: Arc::clone(&self.api),
        }))?;
        tracing::info!(operator_id = %self.id(), "bulk sink started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.buffer.stop(self.flush_timeout.raw()).await?;
        let dropped = self.buffer.dropped_entries();
        if dropped > 0 {
            tracing::warn!(
                operator_id = %self.id(),
                dropped,
                "entries were dropped by the full-buffer policy"
            );
        }
        tracing::info!(operator_id = %self.id(), "bulk sink stopped");
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        Vec::new()
    }

    fn set_outputs(&self, _candidates: &[Arc<dyn Operator>]) -> Result<()> {
        Err(OperatorError::OutputUnsupported(self.id()))
    }

    async fn process(&self, entry: Entry) -> Result<()> {
        self.buffer.push(entry).await
    }
}
