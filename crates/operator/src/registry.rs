//! Operator registry
//!
//! Maps operator type names to factories that deserialize and validate
//! their configuration. The agent constructs one registry with every
//! built-in registered and treats it as immutable afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::BuildContext;
use crate::error::{OperatorError, Result};
use crate::helper::{BasicConfig, OutputIds, WriterConfig};
use crate::Operator;

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// A deserialized, not-yet-built operator configuration
///
/// Builders carry everything the resolver needs before `build`: identity
/// and output ids for defaulting and namespacing, capability flags for
/// wiring checks. The default method implementations derive all of that
/// from the two config accessors, so concrete configs only implement
/// `basic`/`basic_mut`, optionally `writer`/`writer_mut`, and `build`.
pub trait OperatorBuilder: Send + Sync {
    /// The identity section of this config
    fn basic(&self) -> &BasicConfig;

    /// Mutable identity section
    fn basic_mut(&mut self) -> &mut BasicConfig;

    /// The writer section, for operators that emit entries
    fn writer(&self) -> Option<&WriterConfig> {
        None
    }

    /// Mutable writer section
    fn writer_mut(&mut self) -> Option<&mut WriterConfig> {
        None
    }

    /// Whether the built operator will accept entries
    fn can_process(&self) -> bool {
        true
    }

    /// Validate the configuration and produce operator instances
    fn build(&self, context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>>;

    /// The effective operator id (configured id, or the type)
    fn id(&self) -> String {
        self.basic().effective_id()
    }

    /// Replace the operator id
    fn set_id(&mut self, id: String) {
        self.basic_mut().id = id;
    }

    /// The registered type name
    fn operator_type(&self) -> String {
        self.basic().operator_type.clone()
    }

    /// Whether the built operator can be wired to downstreams
    fn can_output(&self) -> bool {
        self.writer().is_some()
    }

    /// The configured output ids (empty for sinks)
    fn output_ids(&self) -> OutputIds {
        self.writer().map(|w| w.output.clone()).unwrap_or_default()
    }

    /// Set the output when none was configured (resolver defaulting)
    fn set_default_output(&mut self, id: String) {
        if let Some(writer) = self.writer_mut() {
            if writer.output.is_empty() {
                writer.output = OutputIds(vec![id]);
            }
        }
    }

    /// Namespace this operator's id and output references
    fn set_namespace(&mut self, namespace: &str, exclusions: &[String]) {
        match self.writer_mut() {
            Some(writer) => writer.set_namespace(namespace, exclusions),
            None => self.basic_mut().set_namespace(namespace, exclusions),
        }
    }
}

impl std::fmt::Debug for dyn OperatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorBuilder")
            .field("id", &self.id())
            .field("operator_type", &self.operator_type())
            .finish()
    }
}

type FactoryFn =
    Arc<dyn Fn(serde_yaml::Value) -> Result<Box<dyn OperatorBuilder>> + Send + Sync>;

/// Registry of operator type name -> config factory
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, FactoryFn>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator config type under a name
    ///
    /// # Panics
    /// Panics if the name is already registered; built-in registration
    /// happens once at agent construction, so a duplicate is a
    /// programming error.
    pub fn register<C>(&mut self, type_name: &str)
    where
        C: OperatorBuilder + DeserializeOwned + Serialize + 'static,
    {
        if self.factories.contains_key(type_name) {
            panic!("operator type '{}' already registered", type_name);
        }
        let factory: FactoryFn = Arc::new(move |value: serde_yaml::Value| {
            let config: C = serde_yaml::from_value(value.clone())
                .map_err(|e| OperatorError::config(e.to_string()))?;
            reject_unknown_fields(&value, &config)?;
            Ok(Box::new(config) as Box<dyn OperatorBuilder>)
        });
        self.factories.insert(type_name.to_owned(), factory);
    }

    /// Whether a type name is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Sorted list of registered type names
    pub fn available_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Deserialize a raw config mapping into a builder for `type_name`
    pub fn deserialize(
        &self,
        type_name: &str,
        value: serde_yaml::Value,
    ) -> Result<Box<dyn OperatorBuilder>> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            OperatorError::config(format!(
                "unknown operator type '{}', available: [{}]",
                type_name,
                self.available_types().join(", ")
            ))
        })?;
        if !value.is_mapping() {
            return Err(OperatorError::config("operator config must be a mapping"));
        }
        factory(value)
    }
}

/// Reject keys in `raw` that the deserialized config does not know
///
/// Serde's `deny_unknown_fields` cannot be combined with the flattened
/// config mixins, so the check compares the raw mapping's keys with the
/// keys of the round-tripped config (defaults serialize too, making the
/// serialized form a superset of every known key).
fn reject_unknown_fields<C: Serialize>(raw: &serde_yaml::Value, config: &C) -> Result<()> {
    let serde_yaml::Value::Mapping(raw_map) = raw else {
        return Err(OperatorError::config("operator config must be a mapping"));
    };
    let known = serde_yaml::to_value(config)
        .map_err(|e| OperatorError::config(e.to_string()))?;
    let serde_yaml::Value::Mapping(known_map) = known else {
        return Ok(());
    };

    for key in raw_map.keys() {
        if !known_map.contains_key(key) {
            let key_text = key.as_str().map(str::to_owned).unwrap_or_else(|| {
                serde_yaml::to_string(key).unwrap_or_default().trim().to_owned()
            });
            return Err(OperatorError::config(format!(
                "unknown field '{key_text}'"
            )));
        }
    }
    Ok(())
}
