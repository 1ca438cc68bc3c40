//! Wires the store, authority, reconciler, and session loop together.

use crate::error::BridgeResult;
use crate::interpreter::CommandInterpreter;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::session::Session;
use crate::transport::{self, Transport};
use authority_client::{Authority, WebhookClient};
use bridge_config_and_utils::{Config, Paths};
use pending_action_store::PendingActionStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A configured bridge, ready to run.
pub struct Bridge {
    config: Config,
    authority: Arc<dyn Authority>,
    store: Arc<PendingActionStore>,
}

impl Bridge {
    /// Validate `config`, open the pending-action store, and build the
    /// webhook client.
    pub fn new(config: Config, paths: &Paths) -> BridgeResult<Self> {
        config.validate()?;
        let authority = Arc::new(WebhookClient::from_config(&config)?);
        let store = Arc::new(PendingActionStore::open(config.pending_file(paths)));
        Ok(Self::with_parts(config, authority, store))
    }

    /// Assemble a bridge from already-built parts.
    pub fn with_parts(
        config: Config,
        authority: Arc<dyn Authority>,
        store: Arc<PendingActionStore>,
    ) -> Self {
        Self {
            config,
            authority,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authority(&self) -> &Arc<dyn Authority> {
        &self.authority
    }

    pub fn store(&self) -> &Arc<PendingActionStore> {
        &self.store
    }

    pub fn interpreter(&self) -> CommandInterpreter {
        CommandInterpreter::new(
            self.authority.clone(),
            self.store.clone(),
            self.config.offline_policy,
            self.config.id_rules.clone(),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.authority.clone(), self.store.clone())
    }

    /// One reconciliation pass, outside the scheduled loop.
    pub async fn sync_once(&self) -> ReconcileReport {
        self.reconciler().run_pass().await
    }

    /// Run on the configured transport until `shutdown` flips.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> BridgeResult<()> {
        let transport = transport::from_config(&self.config.transport).await?;
        self.run_with_transport(transport, shutdown).await
    }

    /// Run the reconciler and the session loop over `transport`.
    pub async fn run_with_transport(
        self,
        transport: Box<dyn Transport>,
        shutdown: watch::Receiver<bool>,
    ) -> BridgeResult<()> {
        info!(
            transport = %transport.describe(),
            offline_policy = ?self.config.offline_policy,
            pending = self.store.len(),
            pending_file = %self.store.path().display(),
            "Bridge starting"
        );

        let reconciler = Arc::new(self.reconciler());
        let reconcile_task = tokio::spawn(
            reconciler.run(self.config.reconcile_interval(), shutdown.clone()),
        );

        let session = Session::new(
            transport,
            Arc::new(self.interpreter()),
            self.config.session.clone(),
        );
        let result = session.run(shutdown).await;

        if result.is_err() {
            reconcile_task.abort();
        }
        if let Err(e) = reconcile_task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Reconciler task failed");
            }
        }

        info!(pending = self.store.len(), "Bridge stopped");
        result
    }
}
