//! Persistence error types

use thiserror::Error;

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistError>;

/// Errors from the offset database
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying embedded database failure
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    /// Filesystem failure while preparing the database path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
