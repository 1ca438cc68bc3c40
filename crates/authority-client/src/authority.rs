use crate::AuthorityResult;
use async_trait::async_trait;
use locker_protocol_types::{EligibilityResult, StudentId};

/// The remote system of record for borrow and return state.
///
/// Implementations must not cache eligibility; every call goes to the
/// authority.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Ask whether `student_id` may borrow a kit.
    ///
    /// An unreachable authority is reported as
    /// `Denied(DenyReason::AuthorityUnreachable)`, never as an error.
    async fn check_eligibility(&self, student_id: &StudentId) -> EligibilityResult;

    /// Record that `student_id` took a kit.
    async fn commit_borrow(&self, student_id: &StudentId) -> AuthorityResult<()>;

    /// Record that `student_id` gave a kit back.
    async fn commit_return(&self, student_id: &StudentId) -> AuthorityResult<()>;

    /// Connectivity check.
    async fn ping(&self) -> AuthorityResult<()>;
}
