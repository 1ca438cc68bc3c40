//! Replays pending actions against the authority.

use authority_client::{Authority, AuthorityResult};
use locker_protocol_types::ActionKind;
use pending_action_store::{PendingAction, PendingActionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Actions tried this pass.
    pub attempted: usize,
    /// Actions the authority accepted and that were dropped from the store.
    pub synced: usize,
    /// Actions left in the store after the pass.
    pub remaining: usize,
}

pub struct Reconciler {
    authority: Arc<dyn Authority>,
    store: Arc<PendingActionStore>,
    /// Held for the whole pass so two passes never replay the same action.
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(authority: Arc<dyn Authority>, store: Arc<PendingActionStore>) -> Self {
        Self {
            authority,
            store,
            pass_lock: Mutex::new(()),
        }
    }

    /// Try every pending action once, oldest first.
    pub async fn run_pass(&self) -> ReconcileReport {
        let _guard = self.pass_lock.lock().await;

        let snapshot = self.store.list();
        if snapshot.is_empty() {
            debug!("Nothing to reconcile");
            return ReconcileReport::default();
        }

        info!(count = snapshot.len(), "Reconciling pending actions");

        let mut synced = 0;
        for action in &snapshot {
            match self.replay(action).await {
                Ok(()) => {
                    if self.store.remove(action.kind, &action.student_id) {
                        synced += 1;
                    }
                    info!(
                        action = %action.kind,
                        student_id = %action.student_id,
                        queued_at = %action.created_at,
                        "Pending action synced"
                    );
                }
                Err(e) => {
                    warn!(
                        action = %action.kind,
                        student_id = %action.student_id,
                        error = %e,
                        "Pending action still failing, keeping it"
                    );
                }
            }
        }

        let report = ReconcileReport {
            attempted: snapshot.len(),
            synced,
            remaining: self.store.len(),
        };
        info!(
            attempted = report.attempted,
            synced = report.synced,
            remaining = report.remaining,
            "Reconciliation pass finished"
        );
        report
    }

    async fn replay(&self, action: &PendingAction) -> AuthorityResult<()> {
        match action.kind {
            ActionKind::Borrow => self.authority.commit_borrow(&action.student_id).await,
            ActionKind::Return => self.authority.commit_return(&action.student_id).await,
        }
    }

    /// Run a pass now and then every `interval` until `shutdown` flips.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Reconciler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.run_pass() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Reconciler stopped");
    }
}
