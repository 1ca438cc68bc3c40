//! Durable store for actions the remote authority has not confirmed yet.
//!
//! When a borrow or return has already been granted to the locker but the
//! authority could not record it, the intent lands here. The reconciler
//! replays entries until the authority accepts them.
//!
//! - PendingActionStore: mutex-guarded list, written through to disk on
//!   every mutation
//! - PendingAction: one queued intent (`{action, student_id, timestamp}`)

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{PendingAction, PendingActionStore, PendingDocument};
