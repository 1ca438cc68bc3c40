//! Process signals that stop the bridge.

use crate::error::BridgeResult;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGTERM (service manager stop) and SIGINT (Ctrl-C).
///
/// Handlers are installed on construction, so a signal delivered before
/// the first `recv` is not lost.
pub struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    pub fn new() -> BridgeResult<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for either signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}
