//! The authority's answer to "may this student borrow?".

use std::fmt;

/// Why a borrow was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The authority has never seen this student.
    NotRegistered,
    /// The student already holds a kit.
    AlreadyBorrowed,
    /// The authority could not be reached after all retries.
    AuthorityUnreachable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::AlreadyBorrowed => "already_borrowed",
            Self::AuthorityUnreachable => "authority_unreachable",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an eligibility check. Produced fresh per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityResult {
    Allowed,
    Denied(DenyReason),
}

impl EligibilityResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}
