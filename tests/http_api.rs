//! HTTP API tests against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use ledger_transfer::account::{Account, AccountStatus, MemoryAccountRegistry};
use ledger_transfer::gateway::{router, state::AppState};
use ledger_transfer::ledger::{CommitFault, MemoryLedger, StoreError};
use ledger_transfer::transfer::{
    LedgerBackends, LogNotifier, RetryPolicy, TransferOrchestrator, TransferSettings,
};
use ledger_transfer::AccountId;

struct TestApp {
    app: Router,
    ledger: Arc<MemoryLedger>,
}

fn test_app() -> TestApp {
    let accounts: MemoryAccountRegistry = [
        Account::new("treasury", "system", "INR"),
        Account::new("acc-alice", "alice", "INR"),
        Account::new("acc-bob", "bob", "INR"),
        Account::new("acc-carol", "carol", "INR").with_status(AccountStatus::Frozen),
    ]
    .into_iter()
    .collect();
    let ledger = Arc::new(MemoryLedger::new());

    let orchestrator = TransferOrchestrator::new(
        LedgerBackends::in_memory(Arc::new(accounts), ledger.clone()),
        Arc::new(LogNotifier),
        TransferSettings {
            retry: RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
            },
            treasury_account: AccountId::from("treasury"),
        },
    );

    TestApp {
        app: router(Arc::new(AppState::new(Arc::new(orchestrator)))),
        ledger,
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    principal: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = principal {
        builder = builder
            .header("x-principal-id", id)
            .header("x-principal-role", role);
    }
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

const ALICE: Option<(&str, &str)> = Some(("alice", "user"));
const OPS: Option<(&str, &str)> = Some(("ops", "system"));

fn transfer_body(from: &str, to: &str, amount: &str, key: &str) -> Value {
    json!({
        "fromAccount": from,
        "toAccount": to,
        "amount": amount,
        "idempotencyKey": key,
    })
}

async fn fund(app: &Router, account: &str, amount: &str, key: &str) {
    let (status, body) = send(
        app,
        "POST",
        "/transfers/system/initial-funds",
        OPS,
        Some(json!({ "toAccount": account, "amount": amount, "idempotencyKey": key })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

#[tokio::test]
async fn test_transfer_replay_and_insufficient_funds() {
    let t = test_app();
    fund(&t.app, "acc-alice", "100", "F1").await;

    // Scenario 1
    let (status, created) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["code"], 0);
    assert_eq!(created["data"]["status"], "COMPLETED");
    assert_eq!(created["data"]["amount"], "40");
    let entries = t.ledger.entry_count();

    // Scenario 2
    let (status, replay) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["data"], created["data"]);
    assert_eq!(t.ledger.entry_count(), entries);

    // Scenario 3
    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "150", "K2")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1002);
    assert_eq!(t.ledger.entry_count(), entries);

    let (status, balance) = send(&t.app, "GET", "/accounts/acc-alice/balance", ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["data"]["balance"], "60");

    let id = created["data"]["id"].as_str().unwrap();
    let (status, fetched) = send(&t.app, "GET", &format!("/transfers/{}", id), ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"], created["data"]);

    let (status, ledger) = send(&t.app, "GET", "/accounts/acc-bob/ledger", Some(("bob", "user")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["data"].as_array().unwrap().len(), 1);
    assert_eq!(ledger["data"][0]["entryType"], "CREDIT");
}

#[tokio::test]
async fn test_client_error_statuses() {
    let t = test_app();
    fund(&t.app, "acc-alice", "100", "F1").await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers",
        None,
        Some(transfer_body("acc-alice", "acc-bob", "1", "K")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(json!({ "fromAccount": "acc-alice", "toAccount": "acc-bob", "amount": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(json!({ "fromAccount": "acc-alice", "toAccount": "acc-bob", "amount": "abc", "idempotencyKey": "K" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-alice", "1", "K")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-carol", "1", "K")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2004);

    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-nobody", "1", "K")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers/system/initial-funds",
        ALICE,
        Some(json!({ "toAccount": "acc-alice", "amount": "5", "idempotencyKey": "F2" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, "GET", "/transfers/not-a-ulid", ALICE, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "GET", "/accounts/acc-bob/balance", ALICE, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // None of the rejected requests wrote anything
    assert_eq!(t.ledger.transaction_count(), 1);
}

#[tokio::test]
async fn test_atomic_write_failure_then_conflict() {
    let t = test_app();
    fund(&t.app, "acc-alice", "100", "F1").await;

    t.ledger.inject_commit_fault(CommitFault {
        after_writes: 1,
        error: StoreError::Database("connection reset".into()),
    });
    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K3")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 5001);

    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K3")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4091);

    let (_, balance) = send(&t.app, "GET", "/accounts/acc-alice/balance", ALICE, None).await;
    assert_eq!(balance["data"]["balance"], "100");
}

#[tokio::test]
async fn test_stranded_pending_reports_in_progress() {
    let t = test_app();
    fund(&t.app, "acc-alice", "100", "F1").await;

    t.ledger.inject_commit_fault(CommitFault {
        after_writes: 0,
        error: StoreError::Database("disk full".into()),
    });
    t.ledger.reject_status_updates(true);
    let (status, _) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K4")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "40", "K4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PENDING");
    assert!(body["msg"].as_str().unwrap().contains("in progress"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_one_wins() {
    let t = test_app();
    fund(&t.app, "acc-alice", "100", "F1").await;

    let a = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "60", "K-a")),
    );
    let b = send(
        &t.app,
        "POST",
        "/transfers",
        ALICE,
        Some(transfer_body("acc-alice", "acc-bob", "60", "K-b")),
    );
    let ((sa, _), (sb, _)) = tokio::join!(a, b);

    let mut statuses = [sa, sb];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let (_, balance) = send(&t.app, "GET", "/accounts/acc-alice/balance", ALICE, None).await;
    assert_eq!(balance["data"]["balance"], "40");
}

#[tokio::test]
async fn test_health_and_openapi() {
    let t = test_app();

    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);

    let (status, doc) = send(&t.app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/transfers"].is_object());
}

#[tokio::test]
async fn test_treasury_and_amount_bounds_rejected() {
    let t = test_app();

    for (i, principal) in [Some(("system", "user")), OPS].into_iter().enumerate() {
        let (status, body) = send(
            &t.app,
            "POST",
            "/transfers",
            principal,
            Some(transfer_body("treasury", "acc-alice", "1000000", &format!("T{}", i))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 2003);
    }

    fund(&t.app, "acc-alice", "100", "F1").await;
    for amount in ["0.000000001", "10000000000000000000000"] {
        let (status, body) = send(
            &t.app,
            "POST",
            "/transfers",
            ALICE,
            Some(transfer_body("acc-alice", "acc-bob", amount, "K-bounds")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", amount);
        assert_eq!(body["code"], 1001);
    }

    let (_, balance) = send(&t.app, "GET", "/accounts/acc-alice/balance", ALICE, None).await;
    assert_eq!(balance["data"]["balance"], "100");
    assert_eq!(t.ledger.transaction_count(), 1);
}
