//! Configuration model
//!
//! Entries keep their raw mapping: operator-specific keys are only
//! interpreted by the registered builder, so the model extracts just
//! the shared keys (`type`, `id`, `output`) it needs for resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

/// A full agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The operator graph, in declaration order
    #[serde(default)]
    pub pipeline: Vec<OperatorConfig>,
}

impl Config {
    /// Parse a YAML configuration
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration file, choosing the parser by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

/// One raw operator entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorConfig(pub serde_yaml::Value);

impl OperatorConfig {
    /// Build an entry from a raw YAML value
    pub fn new(value: serde_yaml::Value) -> Self {
        Self(value)
    }

    /// The raw mapping
    pub fn raw(&self) -> &serde_yaml::Value {
        &self.0
    }

    fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.as_mapping().and_then(|m| m.get(key))
    }

    /// The entry's `type`, required on every entry
    pub fn operator_type(&self, index: usize) -> Result<String> {
        self.get("type")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or(ConfigError::MissingType { index })
    }

    /// The entry's explicit `id`, if present
    pub fn id(&self) -> Option<String> {
        self.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .filter(|id| !id.is_empty())
    }

    /// The entry's `output` references: none, one, or many
    pub fn output_ids(&self) -> Vec<String> {
        match self.get("output") {
            Some(serde_yaml::Value::String(s)) => vec![s.clone()],
            Some(serde_yaml::Value::Sequence(seq)) => seq
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// All keys except `type` and `id`, as plugin template parameters
    pub fn plugin_params(&self) -> serde_yaml::Mapping {
        let mut params = serde_yaml::Mapping::new();
        if let Some(mapping) = self.0.as_mapping() {
            for (key, value) in mapping {
                let is_reserved = key
                    .as_str()
                    .map(|k| k == "type" || k == "id")
                    .unwrap_or(false);
                if !is_reserved {
                    params.insert(key.clone(), value.clone());
                }
            }
        }
        params
    }
}
