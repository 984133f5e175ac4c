//! Plugin templates
//!
//! A plugin is a user-authored file: optional metadata (`version`,
//! `title`, `description`, `parameters`) and a `pipeline:` body written
//! in the ordinary configuration syntax with `{{ .param }}`
//! placeholders. Rendering substitutes validated parameters and parses
//! the result into a sub-pipeline, which the resolver then namespaces
//! by the instance id.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stave_operator::OperatorRegistry;

use crate::error::{ConfigError, Result};
use crate::model::Config;

#[cfg(test)]
#[path = "plugin_test.rs"]
mod tests;

/// Declared type of a plugin parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Int,
    Bool,
    Strings,
    Enum,
}

/// Declaration of one template parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginParameter {
    /// Display name
    #[serde(default)]
    pub label: Option<String>,

    /// Human description
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the caller must supply a value
    #[serde(default)]
    pub required: bool,

    /// Value type
    #[serde(rename = "type", default)]
    pub param_type: ParamType,

    /// Allowed values; only valid (and mandatory) for `enum`
    #[serde(default)]
    pub valid_values: Vec<String>,

    /// Value used when the caller supplies none
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
}

impl PluginParameter {
    fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }

    /// Validate the declaration itself
    fn validate(&self, name: &str) -> Result<()> {
        if self.required && self.default.is_some() {
            return Err(Self::invalid(
                name,
                "a required parameter cannot have a default value",
            ));
        }

        match self.param_type {
            ParamType::Enum => {
                if self.valid_values.is_empty() {
                    return Err(Self::invalid(
                        name,
                        "a parameter of type 'enum' must specify 'valid_values'",
                    ));
                }
            }
            _ => {
                if !self.valid_values.is_empty() {
                    return Err(Self::invalid(
                        name,
                        "'valid_values' is only allowed for parameters of type 'enum'",
                    ));
                }
            }
        }

        if let Some(default) = &self.default {
            self.check_value(name, default)
                .map_err(|e| Self::invalid(name, format!("invalid default: {e}")))?;
        }
        Ok(())
    }

    /// Check a supplied (or default) value against the declared type
    fn check_value(&self, name: &str, value: &serde_yaml::Value) -> Result<()> {
        let ok = match self.param_type {
            ParamType::String => value.is_string(),
            ParamType::Int => value.as_i64().is_some(),
            ParamType::Bool => value.is_bool(),
            ParamType::Strings => value
                .as_sequence()
                .map(|seq| seq.iter().all(|v| v.is_string()))
                .unwrap_or(false),
            ParamType::Enum => value
                .as_str()
                .map(|s| self.valid_values.iter().any(|v| v == s))
                .unwrap_or(false),
        };
        if ok {
            Ok(())
        } else {
            Err(Self::invalid(
                name,
                format!("value does not match declared type {:?}", self.param_type),
            ))
        }
    }
}

/// A parsed, validated plugin template
#[derive(Debug, Clone)]
pub struct PluginDefinition {
    /// Plugin type name (the file stem)
    pub name: String,
    /// Optional template version
    pub version: Option<String>,
    /// Optional display title
    pub title: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Declared parameters
    pub parameters: BTreeMap<String, PluginParameter>,
    /// The raw template text
    template: String,
}

impl PluginDefinition {
    /// Parse and validate a template
    ///
    /// Metadata is extracted from a render with every placeholder blank
    /// so placeholders in the `pipeline:` body cannot corrupt the
    /// metadata sections.
    pub fn parse(name: &str, template: &str) -> Result<Self> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            name: name.to_owned(),
            reason,
        };

        let blank = substitute(template, &HashMap::new());
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&blank).map_err(|e| invalid(e.to_string()))?;
        let mapping = doc
            .as_mapping()
            .ok_or_else(|| invalid("template is not a mapping".to_owned()))?;

        if !mapping.contains_key("pipeline") {
            return Err(invalid("missing required 'pipeline' section".to_owned()));
        }

        let get_str = |key: &str| {
            mapping
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };

        let parameters: BTreeMap<String, PluginParameter> = match mapping.get("parameters") {
            Some(value) => serde_yaml::from_value(value.clone())
                .map_err(|e| invalid(format!("invalid parameters: {e}")))?,
            None => BTreeMap::new(),
        };
        for (param_name, parameter) in &parameters {
            parameter.validate(param_name)?;
        }

        Ok(Self {
            name: name.to_owned(),
            version: get_str("version"),
            title: get_str("title"),
            description: get_str("description"),
            parameters,
            template: template.to_owned(),
        })
    }

    /// Render the template with the supplied parameters
    ///
    /// Declared parameters are type-checked and defaulted; required
    /// parameters without a value fail the render. Undeclared supplied
    /// parameters substitute as-is.
    pub fn render(&self, supplied: &serde_yaml::Mapping) -> Result<Config> {
        let mut values: HashMap<String, String> = HashMap::new();

        for (param_name, parameter) in &self.parameters {
            let key = serde_yaml::Value::String(param_name.clone());
            match supplied.get(&key) {
                Some(value) => {
                    parameter.check_value(param_name, value)?;
                    values.insert(param_name.clone(), render_value(value));
                }
                None => match &parameter.default {
                    Some(default) => {
                        values.insert(param_name.clone(), render_value(default));
                    }
                    None if parameter.required => {
                        return Err(ConfigError::InvalidParameter {
                            name: param_name.clone(),
                            reason: "missing required parameter".to_owned(),
                        });
                    }
                    None => {
                        values.insert(param_name.clone(), String::new());
                    }
                },
            }
        }

        for (key, value) in supplied {
            if let Some(key) = key.as_str() {
                if !self.parameters.contains_key(key) {
                    values.insert(key.to_owned(), render_value(value));
                }
            }
        }

        let rendered = substitute(&self.template, &values);
        serde_yaml::from_str::<Config>(&rendered).map_err(|e| ConfigError::InvalidTemplate {
            name: self.name.clone(),
            reason: format!("failed to render: {e}"),
        })
    }
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Replace every `{{ .name }}` placeholder; unknown names become blank
fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &regex::Captures<'_>| {
            values.get(&captures[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Render a parameter value into template text
///
/// Strings substitute bare; lists render as YAML flow sequences so they
/// drop into `output:`-style keys.
fn render_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Sequence(seq) => {
            let items: Vec<String> = seq
                .iter()
                .map(|item| match item {
                    serde_yaml::Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                    other => render_value(other),
                })
                .collect();
            format!("[{}]", items.join(", "))
        }
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_owned(),
    }
}

/// Registry of loaded plugin templates
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    templates: HashMap<String, PluginDefinition>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.yaml`/`.yml` template in a directory
    ///
    /// The file stem becomes the plugin type; collisions with built-in
    /// operator types or earlier templates are fatal.
    pub fn load_all(&mut self, dir: &Path, builtins: &OperatorRegistry) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut count = 0usize;
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_template {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            self.add(name, &text, builtins)?;
            count += 1;
        }

        tracing::info!(dir = %dir.display(), count, "loaded plugin templates");
        Ok(())
    }

    /// Register a template under a name
    pub fn add(&mut self, name: &str, template: &str, builtins: &OperatorRegistry) -> Result<()> {
        if builtins.contains(name) || self.templates.contains_key(name) {
            return Err(ConfigError::PluginExists(name.to_owned()));
        }
        let definition = PluginDefinition::parse(name, template)?;
        self.templates.insert(name.to_owned(), definition);
        Ok(())
    }

    /// Whether a plugin type is loaded
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Number of loaded templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&PluginDefinition> {
        self.templates.get(name)
    }

    /// Render a loaded plugin with the supplied parameters
    pub fn render(&self, name: &str, supplied: &serde_yaml::Mapping) -> Result<Config> {
        self.templates
            .get(name)
            .ok_or_else(|| ConfigError::PluginNotFound(name.to_owned()))?
            .render(supplied)
    }
}
