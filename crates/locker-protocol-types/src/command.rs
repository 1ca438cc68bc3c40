//! Inbound commands and outbound verdicts.

use crate::{IdRules, StudentId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two things a locker can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Borrow,
    Return,
}

impl ActionKind {
    /// Lowercase wire name, as sent to the authority and stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrow => "borrow",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Borrow(StudentId),
    Return(StudentId),
}

impl Command {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Borrow(_) => ActionKind::Borrow,
            Self::Return(_) => ActionKind::Return,
        }
    }

    pub fn student_id(&self) -> &StudentId {
        match self {
            Self::Borrow(id) | Self::Return(id) => id,
        }
    }
}

/// The one-word answer sent back to the locker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Denied,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Denied => "DENIED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse one line of locker input.
///
/// The line is trimmed and upper-cased, then split on the first comma into a
/// verb and an argument. A line without a comma is the legacy form: the
/// whole line is a student id and the verb is an implicit `BORROW`.
///
/// Returns `Ok(None)` for a blank line, which deserves no reply.
pub fn parse_command(line: &str, rules: &IdRules) -> Result<Option<Command>, ValidationError> {
    let normalized = line.trim().to_uppercase();
    if normalized.is_empty() {
        return Ok(None);
    }

    let (verb, argument) = match normalized.split_once(',') {
        Some((verb, argument)) => (verb.trim(), argument),
        None => ("BORROW", normalized.as_str()),
    };

    let student_id = StudentId::parse(argument, rules)?;

    match verb {
        "BORROW" => Ok(Some(Command::Borrow(student_id))),
        "RETURN" => Ok(Some(Command::Return(student_id))),
        other => Err(ValidationError::UnknownVerb(other.to_string())),
    }
}
