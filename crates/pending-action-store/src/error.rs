//! Pending-action store error types.

use thiserror::Error;

/// Store error type. Only surfaced by the explicit load/persist helpers;
/// `add` and `remove` log these and carry on in memory.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path has no parent directory to write into
    #[error("Invalid store path: {0}")]
    InvalidPath(String),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
