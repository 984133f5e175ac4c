//! Pipeline error types

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from graph validation and lifecycle management
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The operator graph contains a cycle
    #[error("pipeline contains a cycle through operator '{0}'")]
    Cycle(String),

    /// An operator names itself as an output
    #[error("operator '{0}' outputs to itself")]
    SelfLoop(String),

    /// An output references an id that is not in the pipeline
    #[error("operator '{from}' outputs to unknown operator '{to}'")]
    UnknownTarget {
        /// The referencing operator
        from: String,
        /// The missing target id
        to: String,
    },

    /// Two operators ended up with the same id
    #[error("duplicate operator id '{0}'")]
    DuplicateId(String),

    /// An operator failed to start; the pipeline was rolled back
    #[error("failed to start operator '{id}': {source}")]
    StartFailed {
        /// The failing operator
        id: String,
        /// The operator's error
        #[source]
        source: stave_operator::OperatorError,
    },
}
