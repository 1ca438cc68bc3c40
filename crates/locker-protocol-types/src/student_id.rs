//! Student identifiers and the rules that validate them.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum identifier length accepted by default.
pub const DEFAULT_MIN_ID_LEN: usize = 8;

/// Maximum identifier length accepted by default.
pub const DEFAULT_MAX_ID_LEN: usize = 32;

/// Identifier validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdRules {
    /// Shortest accepted identifier.
    pub min_len: usize,
    /// Longest accepted identifier.
    pub max_len: usize,
    /// Reject identifiers containing anything but ASCII digits.
    pub digits_only: bool,
}

impl Default for IdRules {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_ID_LEN,
            max_len: DEFAULT_MAX_ID_LEN,
            digits_only: false,
        }
    }
}

/// An opaque student identifier.
///
/// Deserialization is intentionally unchecked: identifiers read back from
/// the pending-action file were validated when they were first accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Validate `raw` against `rules`.
    pub fn parse(raw: &str, rules: &IdRules) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = raw.chars().count();
        if len < rules.min_len {
            return Err(ValidationError::TooShort {
                len,
                min: rules.min_len,
            });
        }
        if len > rules.max_len {
            return Err(ValidationError::TooLong {
                len,
                max: rules.max_len,
            });
        }
        if rules.digits_only && !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::NonDigit);
        }

        Ok(Self(raw.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StudentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
