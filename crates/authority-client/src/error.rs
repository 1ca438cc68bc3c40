//! Error types for the authority client.

use thiserror::Error;

/// Authority client errors.
#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authority returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("authority unreachable after {attempts} attempts: {last_error}")]
    Unreachable { attempts: u32, last_error: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthorityError {
    /// Whether this error means the authority could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, AuthorityError::Unreachable { .. })
    }
}

/// Result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;
