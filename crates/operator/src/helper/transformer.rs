//! Transformer mixin: per-entry functions with an error policy

use serde::{Deserialize, Serialize};
use stave_entry::Entry;

use crate::error::Result;
use crate::helper::writer::{WriterConfig, WriterOperator};

#[cfg(test)]
#[path = "transformer_test.rs"]
mod tests;

/// What happens to an entry when its transform fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Log and forward the unmodified entry
    #[default]
    Send,
    /// Log and discard the entry
    Drop,
}

/// Configuration shared by every operator that transforms entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerConfig {
    #[serde(flatten)]
    pub writer: WriterConfig,

    /// Entry fate on transform failure
    #[serde(default)]
    pub on_error: OnError,
}

impl TransformerConfig {
    /// Create a transformer config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            writer: WriterConfig::new(id, operator_type),
            on_error: OnError::default(),
        }
    }

    /// Validate and build the transformer mixin
    pub fn build(&self) -> Result<TransformerOperator> {
        Ok(TransformerOperator {
            writer: self.writer.build()?,
            on_error: self.on_error,
        })
    }
}

/// Transformer mixin held by operators that modify entries in place
pub struct TransformerOperator {
    pub writer: WriterOperator,
    on_error: OnError,
}

impl TransformerOperator {
    /// The configured error policy
    pub fn on_error(&self) -> OnError {
        self.on_error
    }

    /// Run `transform` on the entry and forward per the error policy
    ///
    /// On success the transformed entry is forwarded. On failure with
    /// `send`, the entry is forwarded exactly as it was received (the
    /// transform runs on a scratch copy); with `drop` it is discarded.
    pub async fn process_with<F>(&self, entry: Entry, transform: F) -> Result<()>
    where
        F: FnOnce(&mut Entry) -> Result<()>,
    {
        match self.on_error {
            OnError::Drop => {
                let mut entry = entry;
                match transform(&mut entry) {
                    Ok(()) => self.writer.write(entry).await,
                    Err(e) => {
                        tracing::warn!(
                            operator_id = %self.writer.id(),
                            error = %e,
                            "transform failed, dropping entry"
                        );
                    }
                }
            }
            OnError::Send => {
                let mut candidate = entry.clone();
                match transform(&mut candidate) {
                    Ok(()) => self.writer.write(candidate).await,
                    Err(e) => {
                        tracing::warn!(
                            operator_id = %self.writer.id(),
                            error = %e,
                            "transform failed, sending entry unmodified"
                        );
                        self.writer.write(entry).await;
                    }
                }
            }
        }
        Ok(())
    }
}
