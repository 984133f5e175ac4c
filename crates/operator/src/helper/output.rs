//! Output mixin: terminal operators

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::helper::basic::{BasicConfig, BasicOperator};

/// Configuration shared by every sink operator
///
/// Sinks are process-only: they accept entries and cannot be wired to
/// downstreams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(flatten)]
    pub basic: BasicConfig,
}

impl OutputConfig {
    /// Create an output config with the given id and type
    pub fn new(id: impl Into<String>, operator_type: impl Into<String>) -> Self {
        Self {
            basic: BasicConfig::new(id, operator_type),
        }
    }

    /// Validate and build the output mixin
    pub fn build(&self) -> Result<OutputOperator> {
        Ok(OutputOperator {
            basic: self.basic.build()?,
        })
    }
}

/// Output mixin held by sink operators
pub struct OutputOperator {
    basic: BasicOperator,
}

impl OutputOperator {
    /// The operator's namespaced id
    pub fn id(&self) -> String {
        self.basic.id()
    }

    /// The operator's type name
    pub fn operator_type(&self) -> &str {
        self.basic.operator_type()
    }
}
