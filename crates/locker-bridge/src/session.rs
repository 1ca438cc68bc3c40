//! Connection state machine between the locker and the interpreter.
//!
//! ```text
//! Disconnected --open--> Connecting --link--> Connected
//!      ^                     |                    |
//!      |_____ not yet _______|      EOF / error __|
//! ```
//!
//! Commands are handled one at a time in arrival order; the next line is
//! not looked at until the previous verdict has been written.

use crate::error::BridgeResult;
use crate::framing::LineFramer;
use crate::interpreter::CommandInterpreter;
use crate::transport::{BoxedLink, Transport};
use bridge_config_and_utils::SessionConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 1024;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Why a connected link stopped being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkEnd {
    Closed,
    Shutdown,
}

pub struct Session {
    transport: Box<dyn Transport>,
    interpreter: Arc<CommandInterpreter>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(
        transport: Box<dyn Transport>,
        interpreter: Arc<CommandInterpreter>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            transport,
            interpreter,
            config,
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Session state changed");
        }
    }

    /// Serve locker connections until `shutdown` becomes true.
    ///
    /// Only a bad framing configuration is fatal. Transport failures are
    /// logged and retried forever.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> BridgeResult<()> {
        let mut framer = LineFramer::from_config(&self.config)?;

        info!(
            transport = %self.transport.describe(),
            poll_interval_ms = self.config.poll_interval_ms,
            "Session loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(SessionState::Connecting);
            let opened = tokio::select! {
                result = self.transport.open() => result,
                _ = shutdown.changed() => break,
            };

            match opened {
                Ok(Some(link)) => {
                    self.set_state(SessionState::Connected);
                    framer.reset();

                    let end = serve(&self.interpreter, link, &mut framer, &mut shutdown).await;
                    self.set_state(SessionState::Disconnected);
                    if end == LinkEnd::Shutdown {
                        break;
                    }

                    if wait_or_shutdown(self.config.reconnect_delay(), &mut shutdown).await {
                        break;
                    }
                }
                Ok(None) => {
                    self.set_state(SessionState::Disconnected);
                    if wait_or_shutdown(self.config.poll_interval(), &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        transport = %self.transport.describe(),
                        error = %e,
                        "Failed to open transport"
                    );
                    self.set_state(SessionState::Disconnected);
                    if wait_or_shutdown(self.config.poll_interval(), &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        info!("Session loop stopped");
        Ok(())
    }
}

/// Read commands from `link` and answer them until it goes away.
async fn serve(
    interpreter: &CommandInterpreter,
    mut link: BoxedLink,
    framer: &mut LineFramer,
    shutdown: &mut watch::Receiver<bool>,
) -> LinkEnd {
    info!("Locker link established");
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = tokio::select! {
            result = link.read(&mut chunk) => result,
            _ = shutdown.changed() => return LinkEnd::Shutdown,
        };

        let n = match read {
            Ok(0) => {
                info!("Locker link closed");
                return LinkEnd::Closed;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Read from locker link failed");
                return LinkEnd::Closed;
            }
        };

        for line in framer.push(&chunk[..n]) {
            debug!(line = %line, "Received line");

            let Some(verdict) = interpreter.handle_line(&line).await else {
                continue;
            };

            let reply = format!("{}\n", verdict);
            if let Err(e) = write_reply(&mut link, reply.as_bytes()).await {
                warn!(error = %e, verdict = %verdict, "Write to locker link failed");
                return LinkEnd::Closed;
            }
            info!(verdict = %verdict, "Replied to locker");
        }
    }
}

async fn write_reply(link: &mut BoxedLink, reply: &[u8]) -> std::io::Result<()> {
    link.write_all(reply).await?;
    link.flush().await
}

/// Sleep for `delay`. Returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *shutdown.borrow(),
        _ = shutdown.changed() => true,
    }
}
