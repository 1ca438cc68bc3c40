//! Bounded retry with a fixed delay between attempts.

use crate::{AuthorityError, AuthorityResult};
use bridge_config_and_utils::AuthorityConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try a remote call, and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait between attempts. Not applied after the last one.
    pub retry_delay: Duration,
    /// Upper bound for a single request.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&AuthorityConfig> for RetryPolicy {
    fn from(config: &AuthorityConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Shared, injectable sleep used between attempts.
pub type SleepFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Sleep backed by the tokio timer.
pub fn tokio_sleep() -> SleepFn {
    Arc::new(|delay| Box::pin(tokio::time::sleep(delay)))
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. Between failed attempts
/// `sleep(policy.retry_delay)` is awaited. When every attempt fails the
/// result is [`AuthorityError::Unreachable`] carrying the last error text.
pub async fn with_retries<T, Op, Fut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    mut sleep: Sleep,
    mut op: Op,
) -> AuthorityResult<T>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = AuthorityResult<T>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Authority call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %e, "Authority call failed, giving up");
                return Err(AuthorityError::Unreachable {
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    error = %e,
                    "Authority call failed, retrying"
                );
                sleep(policy.retry_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::from_millis(250),
            request_timeout: Duration::from_secs(1),
        }
    }

    fn failure() -> AuthorityError {
        AuthorityError::Status {
            status: 503,
            body: "busy".to_string(),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
        assert_eq!(policy.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_policy_from_config() {
        let config = AuthorityConfig {
            request_timeout_secs: 4,
            max_attempts: 5,
            retry_delay_ms: 20,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_delay, Duration::from_millis(20));
        assert_eq!(policy.request_timeout, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_first_success_does_not_sleep() {
        let sleeps = Mutex::new(Vec::new());
        let result = with_retries(
            &policy(3),
            |d| {
                sleeps.lock().unwrap().push(d);
                async {}
            },
            |_| async { Ok::<_, AuthorityError>(7) },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_succeeds_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let sleeps = Mutex::new(Vec::new());

        let result = with_retries(
            &policy(3),
            |d| {
                sleeps.lock().unwrap().push(d);
                async {}
            },
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(failure())
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_millis(250), Duration::from_millis(250)]
        );
    }

    #[tokio::test]
    async fn test_exhausted_attempts_report_unreachable() {
        let calls = AtomicU32::new(0);
        let sleeps = AtomicU32::new(0);

        let result: AuthorityResult<()> = with_retries(
            &policy(3),
            |_| {
                sleeps.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(failure()) }
            },
        )
        .await;

        match result {
            Err(AuthorityError::Unreachable {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected Unreachable, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No wait after the final attempt
        assert_eq!(sleeps.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result: AuthorityResult<()> = with_retries(
            &policy(0),
            |_| async {},
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(failure()) }
            },
        )
        .await;

        assert!(result.unwrap_err().is_unreachable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleep_waits_between_attempts() {
        let sleep = tokio_sleep();
        let start = tokio::time::Instant::now();

        let result: AuthorityResult<()> = with_retries(
            &policy(3),
            |d| sleep(d),
            |_| async { Err(failure()) },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }
}
