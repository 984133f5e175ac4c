//! Basic operator identity
//!
//! Every operator carries an id and a type. Raw ids may collide across
//! plugin expansions; namespacing prefixes `<instance>.` onto ids and
//! output references to keep them unique in the final flat pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{OperatorError, Result};

/// Prefix `id` with `namespace.` unless it already carries it
///
/// Skipping already-prefixed ids makes namespacing idempotent.
pub fn add_namespace(id: &str, namespace: &str) -> String {
    if id == namespace || id.starts_with(&format!("{namespace}.")) {
        return id.to_owned();
    }
    format!("{namespace}.{id}")
}

/// Whether an id may be namespaced (it is not in the exclusion list)
pub fn can_namespace(id: &str, exclusions: &[String]) -> bool {
    !exclusions.iter().any(|e| e == id)
}

/// Identity shared by every operator config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicConfig {
    /// Operator id; defaults to the type when omitted
    #[serde(default)]
    pub id: String,

    /// Registered operator type name
    #[serde(rename = "type")]
    pub operator_type: String,
}

impl BasicConfig {
    /// Create a config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operator_type: operator_type.into(),
        }
    }

    /// The effective id: the configured id, or the type when empty
    pub fn effective_id(&self) -> String {
        if self.id.is_empty() {
            self.operator_type.clone()
        } else {
            self.id.clone()
        }
    }

    /// Prefix this operator's id with the namespace
    pub fn set_namespace(&mut self, namespace: &str, exclusions: &[String]) {
        let id = self.effective_id();
        if can_namespace(&id, exclusions) {
            self.id = add_namespace(&id, namespace);
        } else {
            self.id = id;
        }
    }

    /// Validate and build the identity mixin
    pub fn build(&self) -> Result<BasicOperator> {
        if self.operator_type.is_empty() {
            return Err(OperatorError::config("missing required field 'type'"));
        }
        Ok(BasicOperator {
            id: self.effective_id(),
            operator_type: self.operator_type.clone(),
        })
    }
}

/// Identity mixin held by every built operator
#[derive(Debug, Clone)]
pub struct BasicOperator {
    id: String,
    operator_type: String,
}

impl BasicOperator {
    /// The operator's namespaced id
    pub fn id(&self) -> String {
        self.id.clone()
    }

    /// The operator's type name
    pub fn operator_type(&self) -> &str {
        &self.operator_type
    }
}
