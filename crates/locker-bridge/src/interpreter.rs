//! Turns a command line into a verdict.
//!
//! Borrow flow: ask the authority, then record the borrow. A borrow that
//! was granted but could not be recorded is queued for reconciliation and
//! still answered `OK`, because the locker opens on `OK` either way.
//! Returns are never refused.

use authority_client::Authority;
use bridge_config_and_utils::OfflinePolicy;
use locker_protocol_types::{
    parse_command, ActionKind, Command, DenyReason, EligibilityResult, IdRules, StudentId, Verdict,
};
use pending_action_store::PendingActionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateless command handler shared by the session loop.
pub struct CommandInterpreter {
    authority: Arc<dyn Authority>,
    store: Arc<PendingActionStore>,
    offline_policy: OfflinePolicy,
    id_rules: IdRules,
}

impl CommandInterpreter {
    pub fn new(
        authority: Arc<dyn Authority>,
        store: Arc<PendingActionStore>,
        offline_policy: OfflinePolicy,
        id_rules: IdRules,
    ) -> Self {
        Self {
            authority,
            store,
            offline_policy,
            id_rules,
        }
    }

    pub fn offline_policy(&self) -> OfflinePolicy {
        self.offline_policy
    }

    /// Handle one framed line.
    ///
    /// Returns `None` for blank lines, which get no reply. Malformed input
    /// is answered `DENIED` without contacting the authority.
    pub async fn handle_line(&self, line: &str) -> Option<Verdict> {
        match parse_command(line, &self.id_rules) {
            Ok(Some(command)) => Some(self.execute(command).await),
            Ok(None) => {
                debug!("Ignoring empty line");
                None
            }
            Err(e) => {
                warn!(line = %line.trim(), error = %e, "Rejecting malformed command");
                Some(Verdict::Denied)
            }
        }
    }

    /// Run a parsed command against the authority.
    pub async fn execute(&self, command: Command) -> Verdict {
        info!(
            action = %command.kind(),
            student_id = %command.student_id(),
            "Processing command"
        );

        let verdict = match command {
            Command::Borrow(student_id) => self.borrow(student_id).await,
            Command::Return(student_id) => self.return_kit(student_id).await,
        };

        debug!(verdict = %verdict, "Command processed");
        verdict
    }

    async fn borrow(&self, student_id: StudentId) -> Verdict {
        match self.authority.check_eligibility(&student_id).await {
            EligibilityResult::Allowed => {}
            EligibilityResult::Denied(DenyReason::AuthorityUnreachable) => {
                match self.offline_policy {
                    OfflinePolicy::Pessimistic => {
                        warn!(
                            student_id = %student_id,
                            "Authority unreachable, denying borrow"
                        );
                        return Verdict::Denied;
                    }
                    OfflinePolicy::Optimistic => {
                        warn!(
                            student_id = %student_id,
                            "Authority unreachable, granting borrow optimistically"
                        );
                    }
                }
            }
            EligibilityResult::Denied(reason) => {
                info!(student_id = %student_id, reason = %reason, "Borrow denied");
                return Verdict::Denied;
            }
        }

        if let Err(e) = self.authority.commit_borrow(&student_id).await {
            warn!(
                student_id = %student_id,
                error = %e,
                "Could not record borrow, deferring to reconciliation"
            );
            self.store.add(ActionKind::Borrow, student_id);
        }
        Verdict::Ok
    }

    async fn return_kit(&self, student_id: StudentId) -> Verdict {
        if let Err(e) = self.authority.commit_return(&student_id).await {
            warn!(
                student_id = %student_id,
                error = %e,
                "Could not record return, deferring to reconciliation"
            );
            self.store.add(ActionKind::Return, student_id);
        }
        Verdict::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::harness::{AuthorityCall, MockAuthority};
    use tempfile::TempDir;

    struct Fixture {
        authority: Arc<MockAuthority>,
        store: Arc<PendingActionStore>,
        interpreter: CommandInterpreter,
        _dir: TempDir,
    }

    fn fixture(policy: OfflinePolicy) -> Fixture {
        let dir = TempDir::new().unwrap();
        let authority = Arc::new(MockAuthority::new());
        let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));
        let interpreter = CommandInterpreter::new(
            authority.clone(),
            store.clone(),
            policy,
            IdRules::default(),
        );
        Fixture {
            authority,
            store,
            interpreter,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_empty_line_gets_no_reply() {
        let f = fixture(OfflinePolicy::Pessimistic);
        assert_eq!(f.interpreter.handle_line("").await, None);
        assert_eq!(f.interpreter.handle_line("  \r").await, None);
        assert!(f.authority.calls().is_empty());
    }

    #[tokio::test]
    async fn test_short_ids_are_denied_without_remote_call() {
        let f = fixture(OfflinePolicy::Optimistic);
        for line in ["1", "1234567", "BORROW,abc", "RETURN,1234567", "BORROW,"] {
            assert_eq!(
                f.interpreter.handle_line(line).await,
                Some(Verdict::Denied),
                "{line}"
            );
        }
        assert!(f.authority.calls().is_empty());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_verb_is_denied() {
        let f = fixture(OfflinePolicy::Pessimistic);
        assert_eq!(
            f.interpreter.handle_line("OPEN,12345678").await,
            Some(Verdict::Denied)
        );
        assert!(f.authority.calls().is_empty());
    }

    #[tokio::test]
    async fn test_allowed_borrow_is_recorded() {
        let f = fixture(OfflinePolicy::Pessimistic);

        let verdict = f.interpreter.handle_line("BORROW,STUDENT001").await;
        assert_eq!(verdict, Some(Verdict::Ok));
        assert_eq!(
            f.authority.calls(),
            vec![
                AuthorityCall::Check("STUDENT001".into()),
                AuthorityCall::Borrow("STUDENT001".into()),
            ]
        );
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_form_is_a_borrow() {
        let f = fixture(OfflinePolicy::Pessimistic);
        f.authority
            .set_eligibility(EligibilityResult::Denied(DenyReason::NotRegistered));

        let verdict = f.interpreter.handle_line("student002\r\n").await;
        assert_eq!(verdict, Some(Verdict::Denied));
        assert_eq!(
            f.authority.calls(),
            vec![AuthorityCall::Check("STUDENT002".into())]
        );
    }

    #[tokio::test]
    async fn test_already_borrowed_is_denied() {
        let f = fixture(OfflinePolicy::Optimistic);
        f.authority
            .set_eligibility(EligibilityResult::Denied(DenyReason::AlreadyBorrowed));

        assert_eq!(
            f.interpreter.handle_line("BORROW,STUDENT004").await,
            Some(Verdict::Denied)
        );
        assert_eq!(f.authority.calls().len(), 1);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_borrow_commit_is_queued() {
        let f = fixture(OfflinePolicy::Pessimistic);
        f.authority.set_commits_ok(false);

        let verdict = f.interpreter.handle_line("BORROW,STUDENT005").await;
        assert_eq!(verdict, Some(Verdict::Ok));

        let pending = f.store.list();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, ActionKind::Borrow);
        assert_eq!(pending[0].student_id.as_str(), "STUDENT005");
    }

    #[tokio::test]
    async fn test_unreachable_pessimistic_denies() {
        let f = fixture(OfflinePolicy::Pessimistic);
        f.authority
            .set_eligibility(EligibilityResult::Denied(DenyReason::AuthorityUnreachable));

        assert_eq!(
            f.interpreter.handle_line("BORROW,STUDENT006").await,
            Some(Verdict::Denied)
        );
        assert_eq!(
            f.authority.calls(),
            vec![AuthorityCall::Check("STUDENT006".into())]
        );
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_optimistic_grants_and_queues() {
        let f = fixture(OfflinePolicy::Optimistic);
        f.authority
            .set_eligibility(EligibilityResult::Denied(DenyReason::AuthorityUnreachable));
        f.authority.set_commits_ok(false);

        assert_eq!(
            f.interpreter.handle_line("BORROW,STUDENT007").await,
            Some(Verdict::Ok)
        );
        assert_eq!(
            f.authority.calls(),
            vec![
                AuthorityCall::Check("STUDENT007".into()),
                AuthorityCall::Borrow("STUDENT007".into()),
            ]
        );
        let pending = f.store.list();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, ActionKind::Borrow);
    }

    #[tokio::test]
    async fn test_unreachable_optimistic_commit_recovers() {
        let f = fixture(OfflinePolicy::Optimistic);
        f.authority
            .set_eligibility(EligibilityResult::Denied(DenyReason::AuthorityUnreachable));

        assert_eq!(
            f.interpreter.handle_line("BORROW,STUDENT008").await,
            Some(Verdict::Ok)
        );
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_return_is_always_ok() {
        for commits_ok in [true, false] {
            let f = fixture(OfflinePolicy::Pessimistic);
            f.authority.set_commits_ok(commits_ok);
            f.authority
                .set_eligibility(EligibilityResult::Denied(DenyReason::AuthorityUnreachable));

            assert_eq!(
                f.interpreter.handle_line("return,student003").await,
                Some(Verdict::Ok)
            );
            assert_eq!(
                f.authority.calls(),
                vec![AuthorityCall::Return("STUDENT003".into())]
            );
            assert_eq!(f.store.len(), usize::from(!commits_ok));
        }
    }
}
