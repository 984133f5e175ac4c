//! Configuration error types
//!
//! Every error here is fatal at build time: the agent refuses to start
//! on a configuration it cannot fully resolve.

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors from loading, rendering, and resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration or plugin file
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path of the file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to parse JSON
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry is missing its `type` key
    #[error("pipeline entry {index} is missing required key 'type'")]
    MissingType {
        /// Position in the pipeline list
        index: usize,
    },

    /// A type is neither a built-in operator nor a loaded plugin
    #[error("unknown operator type '{0}'")]
    UnknownType(String),

    /// A terminal operator that can output has no output configured
    #[error("cannot omit 'output' for '{0}', the last operator in the pipeline")]
    MissingOutput(String),

    /// A plugin template with this name is not loaded
    #[error("plugin type '{0}' does not exist")]
    PluginNotFound(String),

    /// A plugin name collides with an existing type
    #[error("plugin type '{0}' already exists")]
    PluginExists(String),

    /// A plugin file failed to parse as a template
    #[error("failed to parse '{name}' as a plugin template: {reason}")]
    InvalidTemplate {
        /// Plugin name
        name: String,
        /// What went wrong
        reason: String,
    },

    /// A plugin parameter declaration or supplied value is invalid
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What went wrong
        reason: String,
    },

    /// Plugin expansions nest too deeply (almost certainly a cycle)
    #[error("plugin expansion exceeds the nesting limit at '{0}'")]
    NestingTooDeep(String),

    /// A builder rejected its configuration
    #[error(transparent)]
    Operator(#[from] stave_operator::OperatorError),

    /// The operator graph failed validation
    #[error(transparent)]
    Graph(#[from] stave_pipeline::PipelineError),
}
