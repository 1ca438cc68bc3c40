//! Webhook-backed authority.
//!
//! Every operation is a JSON `POST` to a single URL, distinguished by its
//! `action` field.

use crate::{with_retries, Authority, AuthorityError, AuthorityResult, RetryPolicy, SleepFn};
use async_trait::async_trait;
use bridge_config_and_utils::Config;
use locker_protocol_types::{ActionKind, DenyReason, EligibilityResult, StudentId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

const ACTION_CHECK_BORROW: &str = "check_borrow";
const ACTION_TEST: &str = "test";

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_id: Option<&'a str>,
}

/// Body of a `check_borrow` reply. Both fields may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckBorrowResponse {
    #[serde(default)]
    pub can_borrow: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Map a `check_borrow` reply onto an eligibility decision.
///
/// An unknown student wins over `can_borrow`; anything other than an
/// explicit `true` is treated as already borrowed.
pub fn eligibility_from_response(response: &CheckBorrowResponse) -> EligibilityResult {
    let new_student = response
        .message
        .as_deref()
        .map(|m| m.to_ascii_lowercase().contains("new student"))
        .unwrap_or(false);

    if new_student {
        EligibilityResult::Denied(DenyReason::NotRegistered)
    } else if response.can_borrow == Some(true) {
        EligibilityResult::Allowed
    } else {
        EligibilityResult::Denied(DenyReason::AlreadyBorrowed)
    }
}

/// Authority client talking to the locker webhook.
pub struct WebhookClient {
    url: Url,
    client: Client,
    policy: RetryPolicy,
    sleep: SleepFn,
}

impl WebhookClient {
    /// Create a client for `url`. Each request is bounded by
    /// `policy.request_timeout`.
    pub fn new(url: Url, policy: RetryPolicy) -> AuthorityResult<Self> {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .build()?;

        Ok(Self {
            url,
            client,
            policy,
            sleep: crate::tokio_sleep(),
        })
    }

    /// Create a client from the bridge configuration.
    pub fn from_config(config: &Config) -> AuthorityResult<Self> {
        let url = config
            .webhook_url()
            .map_err(|e| AuthorityError::Config(e.to_string()))?;
        Self::new(url, RetryPolicy::from(&config.authority))
    }

    /// Replace the wait used between attempts.
    pub fn with_sleep(mut self, sleep: SleepFn) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One POST. Non-2xx statuses become [`AuthorityError::Status`].
    async fn post_once(&self, request: &WebhookRequest<'_>) -> AuthorityResult<String> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AuthorityError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// POST with retries.
    async fn post(&self, request: WebhookRequest<'_>) -> AuthorityResult<String> {
        let sleep = self.sleep.clone();
        with_retries(
            &self.policy,
            |delay| sleep(delay),
            |attempt| {
                debug!(
                    action = request.action,
                    student_id = request.student_id.unwrap_or(""),
                    attempt,
                    "Calling authority"
                );
                self.post_once(&request)
            },
        )
        .await
    }

    async fn check_once(&self, student_id: &StudentId) -> AuthorityResult<CheckBorrowResponse> {
        let body = self
            .post_once(&WebhookRequest {
                action: ACTION_CHECK_BORROW,
                student_id: Some(student_id.as_str()),
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| AuthorityError::InvalidResponse(e.to_string()))
    }

    /// A 2xx reply still has to be JSON. Script hosts answer errors with
    /// an HTML page and status 200.
    async fn commit_once(&self, kind: ActionKind, student_id: &StudentId) -> AuthorityResult<()> {
        let body = self
            .post_once(&WebhookRequest {
                action: kind.as_str(),
                student_id: Some(student_id.as_str()),
            })
            .await?;
        serde_json::from_str::<serde_json::Value>(&body)
            .map(|_| ())
            .map_err(|e| AuthorityError::InvalidResponse(e.to_string()))
    }

    async fn commit(&self, kind: ActionKind, student_id: &StudentId) -> AuthorityResult<()> {
        let sleep = self.sleep.clone();
        with_retries(
            &self.policy,
            |delay| sleep(delay),
            |attempt| {
                debug!(action = %kind, student_id = %student_id, attempt, "Calling authority");
                self.commit_once(kind, student_id)
            },
        )
        .await?;

        info!(action = %kind, student_id = %student_id, "Authority recorded action");
        Ok(())
    }
}

#[async_trait]
impl Authority for WebhookClient {
    async fn check_eligibility(&self, student_id: &StudentId) -> EligibilityResult {
        let sleep = self.sleep.clone();
        let result = with_retries(&self.policy, |delay| sleep(delay), |_| {
            self.check_once(student_id)
        })
        .await;

        match result {
            Ok(response) => {
                let eligibility = eligibility_from_response(&response);
                debug!(
                    student_id = %student_id,
                    can_borrow = ?response.can_borrow,
                    message = response.message.as_deref().unwrap_or(""),
                    allowed = eligibility.is_allowed(),
                    "Eligibility checked"
                );
                eligibility
            }
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "Eligibility check failed");
                EligibilityResult::Denied(DenyReason::AuthorityUnreachable)
            }
        }
    }

    async fn commit_borrow(&self, student_id: &StudentId) -> AuthorityResult<()> {
        self.commit(ActionKind::Borrow, student_id).await
    }

    async fn commit_return(&self, student_id: &StudentId) -> AuthorityResult<()> {
        self.commit(ActionKind::Return, student_id).await
    }

    async fn ping(&self) -> AuthorityResult<()> {
        self.post(WebhookRequest {
            action: ACTION_TEST,
            student_id: None,
        })
        .await
        .map(|_| ())
    }
}
