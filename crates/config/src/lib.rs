//! Stave - Config
//!
//! The declarative pipeline configuration and the resolver that turns
//! it into wired operators.
//!
//! # Overview
//!
//! A configuration is a `pipeline:` list of operator entries (YAML
//! primary, JSON accepted). Each entry names a `type` registered either
//! as a built-in operator or as a user-authored plugin template; plugin
//! entries are rendered into sub-pipelines and namespaced by their
//! instance id before building.
//!
//! The resolver defaults missing ids and outputs, deserializes and
//! validates every builder, builds the operators, wires outputs,
//! verifies the graph is a DAG, and hands back the operators in
//! topological order for the pipeline scheduler.

mod error;
mod model;
mod plugin;
mod resolver;

pub use error::{ConfigError, Result};
pub use model::{Config, OperatorConfig};
pub use plugin::{ParamType, PluginDefinition, PluginParameter, PluginRegistry};
pub use resolver::resolve_pipeline;
