//! Remote authority client for the SmartLocker bridge.
//!
//! The authority is the system of record for who holds a kit. The bridge
//! asks it whether a borrow is allowed and tells it when a borrow or return
//! happened. Every call is retried a bounded number of times; once the
//! attempts are exhausted the failure comes back as a value.

mod authority;
mod error;
mod retry;
mod webhook;

/// Test utilities for code talking to the webhook.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use authority::Authority;
pub use error::{AuthorityError, AuthorityResult};
pub use retry::{tokio_sleep, with_retries, RetryPolicy, SleepFn};
pub use webhook::{eligibility_from_response, CheckBorrowResponse, WebhookClient};
