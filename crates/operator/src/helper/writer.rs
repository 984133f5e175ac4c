//! Writer mixin: wired downstreams and fan-out emission
//!
//! A writer with N downstreams clones the entry for the first N-1 and
//! moves it into the last. The common single-downstream case therefore
//! never copies, and fan-out never shares a mutable entry between
//! downstreams.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;

use crate::error::{OperatorError, Result};
use crate::helper::basic::{add_namespace, can_namespace, BasicConfig, BasicOperator};
use crate::Operator;

#[cfg(test)]
#[path = "writer_test.rs"]
mod tests;

/// Downstream operator ids, accepted as a string or a list of strings
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OutputIds(pub Vec<String>);

impl OutputIds {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for OutputIds {
    fn from(ids: Vec<String>) -> Self {
        OutputIds(ids)
    }
}

impl<'de> Deserialize<'de> for OutputIds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(id) => OutputIds(vec![id]),
            Raw::Many(ids) => OutputIds(ids),
        })
    }
}

/// Configuration shared by every operator that emits entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriterConfig {
    #[serde(flatten)]
    pub basic: BasicConfig,

    /// Downstream operator id(s); defaults to the next operator in
    /// declaration order
    #[serde(default)]
    pub output: OutputIds,
}

impl WriterConfig {
    /// Create a writer config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            basic: BasicConfig::new(id, operator_type),
            output: OutputIds::default(),
        }
    }

    /// Namespace the operator id and each non-excluded output reference
    pub fn set_namespace(&mut self, namespace: &str, exclusions: &[String]) {
        self.basic.set_namespace(namespace, exclusions);
        for output_id in &mut self.output.0 {
            if can_namespace(output_id, exclusions) {
                *output_id = add_namespace(output_id, namespace);
            }
        }
    }

    /// Validate and build the writer mixin
    pub fn build(&self) -> Result<WriterOperator> {
        Ok(WriterOperator {
            basic: self.basic.build()?,
            output_ids: self.output.clone(),
            outputs: RwLock::new(Vec::new()),
        })
    }
}

/// Writer mixin held by operators that emit entries
pub struct WriterOperator {
    basic: BasicOperator,
    output_ids: OutputIds,
    outputs: RwLock<Vec<Arc<dyn Operator>>>,
}

impl WriterOperator {
    /// The operator's namespaced id
    pub fn id(&self) -> String {
        self.basic.id()
    }

    /// The operator's type name
    pub fn operator_type(&self) -> &str {
        self.basic.operator_type()
    }

    /// The configured (pre-wire) output ids
    pub fn output_ids(&self) -> &OutputIds {
        &self.output_ids
    }

    /// The wired downstream operators
    pub fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        self.outputs.read().clone()
    }

    /// Resolve output ids against the built operator set
    ///
    /// When no output was configured, the operator after this one in
    /// declaration order becomes the single downstream; a terminal
    /// operator without an output is a wiring error.
    pub fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()> {
        let mut wired: Vec<Arc<dyn Operator>> = Vec::new();

        for output_id in self.output_ids.iter() {
            let target = candidates
                .iter()
                .find(|op| op.id() == *output_id)
                .ok_or_else(|| OperatorError::UnknownOutput(output_id.clone()))?;
            if !target.can_process() {
                return Err(OperatorError::CannotProcess(output_id.clone()));
            }
            wired.push(Arc::clone(target));
        }

        if self.output_ids.is_empty() {
            let own_id = self.id();
            let position = candidates
                .iter()
                .position(|op| op.id() == own_id)
                .ok_or_else(|| {
                    OperatorError::lifecycle(format!(
                        "operator '{own_id}' not found in the pipeline while wiring"
                    ))
                })?;
            let next = candidates.get(position + 1).ok_or_else(|| {
                OperatorError::config(format!(
                    "cannot omit 'output' for '{own_id}', the last operator in the pipeline"
                ))
            })?;
            if !next.can_process() {
                return Err(OperatorError::CannotProcess(next.id()));
            }
            wired.push(Arc::clone(next));
        }

        *self.outputs.write() = wired;
        Ok(())
    }

    /// Emit an entry to every wired downstream
    ///
    /// Downstream errors are logged and do not stop fan-out.
    pub async fn write(&self, entry: Entry) {
        let outputs = self.outputs.read().clone();
        let Some((last, rest)) = outputs.split_last() else {
            return;
        };

        for downstream in rest {
            if let Err(e) = downstream.process(entry.clone()).await {
                tracing::warn!(
                    operator_id = %self.id(),
                    output_id = %downstream.id(),
                    error = %e,
                    "downstream failed to process entry"
                );
            }
        }
        if let Err(e) = last.process(entry).await {
            tracing::warn!(
                operator_id = %self.id(),
                output_id = %last.id(),
                error = %e,
                "downstream failed to process entry"
            );
        }
    }
}
