//! End-to-end runs with the real webhook client against a mock webhook.

use super::harness::{
    exchange, fast_session_config, student, AuthorityCall, DuplexTransport, MockAuthority,
    MockWebhook, TEST_TIMEOUT,
};
use crate::bridge::Bridge;
use crate::interpreter::CommandInterpreter;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::session::Session;
use authority_client::{Authority, RetryPolicy, SleepFn, WebhookClient};
use bridge_config_and_utils::{Config, OfflinePolicy};
use locker_protocol_types::{ActionKind, IdRules};
use pending_action_store::PendingActionStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::timeout;
use url::Url;

fn webhook_client(url: &Url) -> Arc<WebhookClient> {
    let no_wait: SleepFn = Arc::new(|_| Box::pin(async {}));
    let policy = RetryPolicy {
        max_attempts: 3,
        retry_delay: Duration::from_secs(1),
        request_timeout: Duration::from_secs(2),
    };
    Arc::new(
        WebhookClient::new(url.clone(), policy)
            .unwrap()
            .with_sleep(no_wait),
    )
}

/// Send one line through a fresh session and return the reply.
async fn run_line(
    authority: Arc<dyn Authority>,
    store: Arc<PendingActionStore>,
    line: &str,
) -> String {
    let interpreter = Arc::new(CommandInterpreter::new(
        authority,
        store,
        OfflinePolicy::Pessimistic,
        IdRules::default(),
    ));
    let (transport, feeder) = DuplexTransport::pair();
    let session = Session::new(Box::new(transport), interpreter, fast_session_config());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(shutdown_rx));

    let mut locker = feeder.connect();
    let reply = exchange(&mut locker, line).await;

    shutdown_tx.send(true).unwrap();
    timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap().unwrap();
    reply
}

#[tokio::test]
async fn allowed_borrow_is_ok_and_store_unchanged() {
    let webhook = MockWebhook::start(vec![
        ("check_borrow", 200, r#"{"can_borrow": true, "message": "ok"}"#),
        ("borrow", 200, r#"{"status": "recorded"}"#),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));

    let reply = run_line(webhook_client(&webhook.url), store.clone(), "BORROW,STUDENT001").await;

    assert_eq!(reply, "OK");
    assert!(store.is_empty());
    assert_eq!(
        webhook.requests(),
        vec![
            serde_json::json!({"action": "check_borrow", "student_id": "STUDENT001"}),
            serde_json::json!({"action": "borrow", "student_id": "STUDENT001"}),
        ]
    );
}

#[tokio::test]
async fn legacy_id_for_new_student_is_denied() {
    let webhook = MockWebhook::start(vec![(
        "check_borrow",
        200,
        r#"{"can_borrow": false, "message": "new student"}"#,
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));

    let reply = run_line(webhook_client(&webhook.url), store.clone(), "STUDENT002").await;

    assert_eq!(reply, "DENIED");
    assert_eq!(webhook.count("check_borrow"), 1);
    assert_eq!(webhook.count("borrow"), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn unreachable_return_is_ok_and_queued() {
    let webhook = MockWebhook::start(vec![("return", 503, "unavailable")]).await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");
    let store = Arc::new(PendingActionStore::open(&path));

    let reply = run_line(webhook_client(&webhook.url), store.clone(), "RETURN,STUDENT003").await;

    assert_eq!(reply, "OK");
    assert_eq!(webhook.count("return"), 3);

    let pending = store.list();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, ActionKind::Return);
    assert_eq!(pending[0].student_id.as_str(), "STUDENT003");

    // Survives a restart
    let reopened = PendingActionStore::open(&path);
    assert_eq!(reopened.list(), pending);
}

#[tokio::test]
async fn short_id_never_reaches_webhook() {
    let webhook = MockWebhook::start(vec![]).await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));

    let reply = run_line(webhook_client(&webhook.url), store, "BORROW,42").await;

    assert_eq!(reply, "DENIED");
    assert!(webhook.requests().is_empty());
}

#[tokio::test]
async fn reconciliation_keeps_only_the_still_failing_action() {
    let webhook = MockWebhook::start(vec![
        ("borrow", 200, "{}"),
        ("return", 500, "still broken"),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));
    store.add(ActionKind::Borrow, student("STUDENT001"));
    store.add(ActionKind::Return, student("STUDENT002"));

    let reconciler = Reconciler::new(webhook_client(&webhook.url), store.clone());
    let report = reconciler.run_pass().await;

    assert_eq!(
        report,
        ReconcileReport {
            attempted: 2,
            synced: 1,
            remaining: 1
        }
    );
    let remaining = store.list();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind, ActionKind::Return);
    assert_eq!(remaining[0].student_id.as_str(), "STUDENT002");
}

#[tokio::test]
async fn bridge_reconciles_at_startup_and_stops_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");
    {
        let store = PendingActionStore::open(&path);
        store.add(ActionKind::Return, student("STUDENT005"));
    }

    let authority = Arc::new(MockAuthority::new());
    let store = Arc::new(PendingActionStore::open(&path));
    assert_eq!(store.len(), 1);

    let config = Config {
        session: fast_session_config(),
        ..Default::default()
    };
    let bridge = Bridge::with_parts(config, authority.clone(), store.clone());

    let (transport, feeder) = DuplexTransport::pair();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(bridge.run_with_transport(Box::new(transport), shutdown_rx));

    timeout(TEST_TIMEOUT, async {
        while !store.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("startup reconciliation did not run");

    let mut locker = feeder.connect();
    assert_eq!(exchange(&mut locker, "BORROW,STUDENT006").await, "OK");

    shutdown_tx.send(true).unwrap();
    timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap().unwrap();

    assert_eq!(
        authority.calls(),
        vec![
            AuthorityCall::Return("STUDENT005".into()),
            AuthorityCall::Check("STUDENT006".into()),
            AuthorityCall::Borrow("STUDENT006".into()),
        ]
    );
}

#[tokio::test]
async fn sync_once_reports() {
    let dir = TempDir::new().unwrap();
    let authority = Arc::new(MockAuthority::new());
    let store = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));
    store.add(ActionKind::Borrow, student("STUDENT007"));
    authority.set_commits_ok(false);

    let bridge = Bridge::with_parts(Config::default(), authority.clone(), store.clone());
    let report = bridge.sync_once().await;
    assert_eq!(report.remaining, 1);

    authority.set_commits_ok(true);
    let report = bridge.sync_once().await;
    assert_eq!(
        report,
        ReconcileReport {
            attempted: 1,
            synced: 1,
            remaining: 0
        }
    );
}

#[test]
fn bridge_new_requires_webhook_url() {
    let dir = TempDir::new().unwrap();
    let paths = bridge_config_and_utils::Paths::with_base_dir(dir.path().to_path_buf());
    let config = Config {
        webhook_url: None,
        ..Default::default()
    };
    assert!(Bridge::new(config, &paths).is_err());

    let config = Config {
        webhook_url: Some("http://127.0.0.1:1/webhook".into()),
        ..Default::default()
    };
    let bridge = Bridge::new(config, &paths).unwrap();
    assert_eq!(bridge.store().path(), paths.pending_file());
}
