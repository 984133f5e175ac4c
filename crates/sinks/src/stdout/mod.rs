//! Stdout sink
//!
//! Serializes each entry as one JSON line. Not intended for production
//! throughput; the writer is injectable so tests can capture output.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;
use stave_operator::helper::{BasicConfig, OutputConfig, OutputOperator};
use stave_operator::{BuildContext, Operator, OperatorBuilder, OperatorError, Result};

#[cfg(test)]
#[path = "stdout_test.rs"]
mod tests;

/// Configuration for the stdout sink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StdoutConfig {
    #[serde(flatten)]
    pub output: OutputConfig,
}

impl StdoutConfig {
    /// Create a config with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            output: OutputConfig::new(id, "stdout"),
        }
    }
}

impl OperatorBuilder for StdoutConfig {
    fn basic(&self) -> &BasicConfig {
        &self.output.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.output.basic
    }

    fn build(&self, _context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        Ok(vec![Arc::new(StdoutSink::new(
            self,
            Box::new(std::io::stdout()),
        )?)])
    }
}

/// Sink that prints entries as JSON lines
pub struct StdoutSink {
    output: OutputOperator,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    /// Create the sink with an explicit writer
    pub fn new(config: &StdoutConfig, writer: Box<dyn Write + Send>) -> Result<Self> {
        Ok(Self {
            output: config.output.build()?,
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl Operator for StdoutSink {
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
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        Vec::new()
    }

    fn set_outputs(&self, _candidates: &[Arc<dyn Operator>]) -> Result<()> {
        Err(OperatorError::OutputUnsupported(self.id()))
    }

    async fn process(&self, entry: Entry) -> Result<()> {
        let line = serde_json::to_vec(&entry)
            .map_err(|e| OperatorError::transform(e.to_string()))?;
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
