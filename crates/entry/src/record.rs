//! The entry record

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Severity, Value};

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;

/// The unit of flow through the pipeline
///
/// Cloning an entry is a deep copy: every field is owned, so a clone
/// shares no mutable state with the original. The writer fan-out relies
/// on this to isolate downstream operators from each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Event time, nanosecond precision; defaults to creation time
    pub timestamp: DateTime<Utc>,

    /// The record body: a scalar or a nested map
    pub record: Value,

    /// Flat, low-cardinality metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Source identity (log group, region, stream, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource: HashMap<String, String>,

    /// Ordered tag list, duplicates allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Severity level
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub severity: Severity,
}

fn is_unknown(s: &Severity) -> bool {
    *s == Severity::Unknown
}

impl Entry {
    /// Create an empty entry stamped with the current time
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            record: Value::empty_map(),
            labels: HashMap::new(),
            resource: HashMap::new(),
            tags: Vec::new(),
            severity: Severity::Unknown,
        }
    }

    /// Create an entry whose record is `{"message": value}`
    pub fn basic(message: impl Into<Value>) -> Self {
        let mut entry = Self::new();
        entry.record = [("message".to_owned(), message.into())]
            .into_iter()
            .collect();
        entry
    }

    /// Create an entry with the given record
    pub fn from_record(record: impl Into<Value>) -> Self {
        let mut entry = Self::new();
        entry.record = record.into();
        entry
    }

    /// Set a label, replacing any previous value
    pub fn add_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.insert(key.into(), value.into());
    }

    /// Set a resource key, replacing any previous value
    pub fn add_resource_key(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.resource.insert(key.into(), value.into());
    }

    /// Append a tag
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}
