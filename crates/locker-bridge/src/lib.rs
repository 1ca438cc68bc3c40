//! SmartLocker bridge: connects a locker controller to the remote
//! borrow/return authority.
//!
//! The locker sends one command per line (`BORROW,<id>`, `RETURN,<id>`, or
//! a bare `<id>` meaning borrow) and waits for `OK` or `DENIED`. The bridge
//! asks the authority, answers, and queues whatever the authority could
//! not be told about for later reconciliation.
//!
//! # Architecture
//!
//! ```text
//! locker --line--> Session --> CommandInterpreter --> Authority
//!   ^                 |                |
//!   |___ OK/DENIED ___|                v
//!                              PendingActionStore <-- Reconciler
//! ```
//!
//! # Invariants
//!
//! 1. **Returns are never refused**: a return is always answered `OK`
//! 2. **Validation first**: malformed ids never reach the authority
//! 3. **No lost intents**: an unrecorded borrow or return stays queued on
//!    disk until the authority accepts it
//! 4. **No kit cache**: eligibility is always asked of the authority

pub mod bridge;
pub mod config;
pub mod error;
pub mod framing;
pub mod interpreter;
pub mod reconciler;
pub mod session;
pub mod signals;
pub mod transport;

#[cfg(test)]
mod tests;

pub use bridge::Bridge;
pub use config::Overrides;
pub use error::{BridgeError, BridgeResult};
pub use framing::LineFramer;
pub use interpreter::CommandInterpreter;
pub use reconciler::{ReconcileReport, Reconciler};
pub use session::{Session, SessionState};
pub use signals::ShutdownSignals;
pub use transport::{BoxedLink, DeviceLink, DeviceTransport, Link, TcpTransport, Transport};
