//! Drop sink
//!
//! Consumes and ignores incoming entries. Registered as `drop_output`;
//! useful as a pipeline terminator during development and in templates.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;
use stave_operator::helper::{BasicConfig, OutputConfig, OutputOperator};
use stave_operator::{BuildContext, Operator, OperatorBuilder, OperatorError, Result};

#[cfg(test)]
#[path = "null_test.rs"]
mod tests;

/// Configuration for the drop sink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropOutputConfig {
    #[serde(flatten)]
    pub output: OutputConfig,
}

impl DropOutputConfig {
    /// Create a config with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            output: OutputConfig::new(id, "drop_output"),
        }
    }
}

impl OperatorBuilder for DropOutputConfig {
    fn basic(&self) -> &BasicConfig {
        &self.output.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.output.basic
    }

    fn build(&self, _context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        Ok(vec![Arc::new(DropOutput {
            output: self.output.build()?,
        })])
    }
}

/// Sink that discards everything
pub struct DropOutput {
    output: OutputOperator,
}

#[async_trait]
impl Operator for DropOutput {
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
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        Vec::new()
    }

    fn set_outputs(&self, _candidates: &[Arc<dyn Operator>]) -> Result<()> {
        Err(OperatorError::OutputUnsupported(self.id()))
    }

    async fn process(&self, _entry: Entry) -> Result<()> {
        Ok(())
    }
}
