//! Operator error types

use thiserror::Error;

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors raised by operators at build time and at runtime
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Invalid operator configuration (missing/out-of-range parameter)
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A wired output id does not exist in the built set
    #[error("operator '{0}' does not exist")]
    UnknownOutput(String),

    /// A wired output target does not accept entries
    #[error("operator '{0}' can not process entries")]
    CannotProcess(String),

    /// `process` was called on an operator that does not accept entries
    #[error("operator '{0}' does not support processing")]
    ProcessingUnsupported(String),

    /// `set_outputs` was called on an operator that cannot output
    #[error("operator '{0}' does not support outputs")]
    OutputUnsupported(String),

    /// Per-entry transform or parse failure, routed through `on_error`
    #[error("transform failed: {0}")]
    Transform(String),

    /// A field the operator needs is absent from the entry
    #[error("field '{0}' is not present on the entry")]
    MissingField(String),

    /// Failure while starting or stopping the operator
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Offset store failure
    #[error(transparent)]
    Persist(#[from] stave_persist::PersistError),

    /// Boundary client failure
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OperatorError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a transform error
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }
}

/// Failure reported by an injected wire client (logs API, event bus,
/// bulk endpoint)
///
/// The affected component retries transient failures (sink buffers with
/// backoff, pollers on the next interval); permanent failures terminate
/// the attempt and are logged.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The operation may succeed if retried
    #[error("transient boundary error: {0}")]
    Transient(String),

    /// Retrying will not help
    #[error("permanent boundary error: {0}")]
    Permanent(String),
}

impl BoundaryError {
    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }
}
