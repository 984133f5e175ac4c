//! Noop transformer
//!
//! Forwards entries unchanged. Useful as a pipeline placeholder and as
//! the smallest possible exercise of the transformer mixin.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;
use stave_operator::helper::{BasicConfig, TransformerConfig, TransformerOperator, WriterConfig};
use stave_operator::{BuildContext, Operator, OperatorBuilder, Result};

#[cfg(test)]
#[path = "noop_test.rs"]
mod tests;

/// Configuration for the noop transformer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoopConfig {
    #[serde(flatten)]
    pub transformer: TransformerConfig,
}

impl NoopConfig {
    /// Create a config with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            transformer: TransformerConfig::new(id, "noop"),
        }
    }
}

impl OperatorBuilder for NoopConfig {
    fn basic(&self) -> &BasicConfig {
        &self.transformer.writer.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.transformer.writer.basic
    }

    fn writer(&self) -> Option<&WriterConfig> {
        Some(&self.transformer.writer)
    }

    fn writer_mut(&mut self) -> Option<&mut WriterConfig> {
        Some(&mut self.transformer.writer)
    }

    fn build(&self, _context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        Ok(vec![Arc::new(NoopTransformer {
            transformer: self.transformer.build()?,
        })])
    }
}

/// Pass-through operator
pub struct NoopTransformer {
    transformer: TransformerOperator,
}

#[async_trait]
impl Operator for NoopTransformer {
    fn id(&self) -> String {
        self.transformer.writer.id()
    }

    fn operator_type(&self) -> &str {
        self.transformer.writer.operator_type()
    }

    fn can_process(&self) -> bool {
        true
    }

    fn can_output(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        self.transformer.writer.outputs()
    }

    fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()> {
        self.transformer.writer.set_outputs(candidates)
    }

    async fn process(&self, entry: Entry) -> Result<()> {
        self.transformer.process_with(entry, |_| Ok(())).await
    }
}
