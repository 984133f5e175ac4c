//! Input mixin: entry creation for source operators

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Value};

use crate::error::Result;
use crate::helper::writer::{WriterConfig, WriterOperator};

/// Configuration shared by every source operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(flatten)]
    pub writer: WriterConfig,

    /// Labels stamped onto every emitted entry
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Resource keys stamped onto every emitted entry
    #[serde(default)]
    pub resource: HashMap<String, String>,
}

impl InputConfig {
    /// Create an input config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            writer: WriterConfig::new(id, operator_type),
            labels: HashMap::new(),
            resource: HashMap::new(),
        }
    }

    /// Validate and build the input mixin
    pub fn build(&self) -> Result<InputOperator> {
        Ok(InputOperator {
            writer: self.writer.build()?,
            labels: self.labels.clone(),
            resource: self.resource.clone(),
        })
    }
}

/// Input mixin held by source operators
///
/// Sources are output-only: `can_output` is true, `can_process` false.
pub struct InputOperator {
    pub writer: WriterOperator,
    labels: HashMap<String, String>,
    resource: HashMap<String, String>,
}

impl InputOperator {
    /// Create an entry with the configured labels and resource applied
    pub fn new_entry(&self, record: impl Into<Value>) -> Entry {
        let mut entry = Entry::from_record(record);
        for (k, v) in &self.labels {
            entry.add_label(k.clone(), v.clone());
        }
        for (k, v) in &self.resource {
            entry.add_resource_key(k.clone(), v.clone());
        }
        entry
    }

    /// Emit an entry downstream
    pub async fn write(&self, entry: Entry) {
        self.writer.write(entry).await;
    }
}
