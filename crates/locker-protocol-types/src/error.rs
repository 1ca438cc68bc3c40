//! Validation errors for inbound commands.

use thiserror::Error;

/// Why an inbound line was rejected before any remote call was made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The identifier was empty after trimming.
    #[error("student id is empty")]
    Empty,

    /// The identifier is shorter than the configured minimum.
    #[error("student id too short: {len} < {min}")]
    TooShort { len: usize, min: usize },

    /// The identifier is longer than the configured maximum.
    #[error("student id too long: {len} > {max}")]
    TooLong { len: usize, max: usize },

    /// Digits-only rules are active and the identifier contains something else.
    #[error("student id must contain only digits")]
    NonDigit,

    /// The verb before the comma is neither BORROW nor RETURN.
    #[error("unknown command verb: {0}")]
    UnknownVerb(String),
}
