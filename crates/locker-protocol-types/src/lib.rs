//! Shared wire and domain types for the SmartLocker bridge.
//!
//! The locker controller speaks a tiny line protocol:
//!
//! ```text
//! <ID>            legacy form, implicit borrow
//! BORROW,<ID>
//! RETURN,<ID>
//! ```
//!
//! and receives exactly `OK` or `DENIED` back. This crate holds the types
//! every other crate agrees on: identifiers, commands, verdicts and the
//! eligibility answer from the remote authority.

mod command;
mod eligibility;
mod error;
mod student_id;

pub use command::{parse_command, ActionKind, Command, Verdict};
pub use eligibility::{DenyReason, EligibilityResult};
pub use error::ValidationError;
pub use student_id::{IdRules, StudentId, DEFAULT_MAX_ID_LEN, DEFAULT_MIN_ID_LEN};
