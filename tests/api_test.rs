use axum::http::StatusCode;
use lockdesk::api::{self, AppState};
use lockdesk::datasource::{MockLedger, StaticSession};
use lockdesk::domain::{Address, Amount, FeeSettings, ItemLimits};
use lockdesk::orchestration::LockDesk;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

const DAY: u64 = 86_400;

struct TestApp {
    app: axum::Router,
    mock: Arc<MockLedger>,
}

fn account() -> Address {
    "0x6666666666666666666666666666666666666666".parse().unwrap()
}

async fn setup_test_app(mock: MockLedger) -> TestApp {
    let mock = Arc::new(
        mock.with_fees(FeeSettings {
            performance_fee: 250,
            ..FeeSettings::default()
        })
        .with_item(ItemLimits {
            token_id: 7,
            min_investment: Amount::new(100),
            max_investment: Amount::new(1_000_000_000),
            min_lock_duration: DAY,
            max_lock_duration: 30 * DAY,
            apr_bps: 1_000,
            strategy_id: 1,
        }),
    );
    let desk = LockDesk::from_ledger(
        mock.clone(),
        Arc::new(StaticSession::new(Some(account()))),
        30 * DAY,
    );
    desk.refresh().await.unwrap();
    let app = api::create_router(AppState::new(Arc::new(desk)));
    TestApp { app, mock }
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => axum::body::Body::from(body.to_string()),
            None => axum::body::Body::empty(),
        })
        .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_ready() {
    let test = setup_test_app(MockLedger::new()).await;

    let (status, body) = request(&test.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(&test.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    assert_eq!(body["generation"], 1);
}

#[tokio::test]
async fn test_locks_view_groups_and_flags() {
    let test = setup_test_app(
        MockLedger::new()
            .with_fungible(0, 5, 1)
            .with_fungible(7, 10, 1)
            .with_native(7, 100, 1)
            .with_native(7, 200, u64::MAX),
    )
    .await;

    let (status, body) = request(&test.app, "GET", "/v1/locks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 1);
    assert_eq!(body["availableNative"], 1);

    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["key"], 0);
    assert_eq!(groups[1]["key"], 7);
    assert_eq!(groups[1]["rows"], 2);
    assert_eq!(groups[1]["outstandingNativeAmount"], "300");
    assert_eq!(groups[1]["native"][0]["id"], "native-7-0");
    assert_eq!(groups[1]["native"][0]["matured"], true);
    assert_eq!(groups[1]["native"][1]["selectable"], false);
}

#[tokio::test]
async fn test_toggle_and_selection_totals() {
    let test = setup_test_app(
        MockLedger::new()
            .with_native(7, 100, 1)
            .with_native(7, 200, 1)
            .with_native(9, 50, 1),
    )
    .await;

    for id in ["native-7-0", "native-7-1"] {
        let body = Some(json!({ "id": id }));
        let (status, body) = request(&test.app, "POST", "/v1/selection/toggle", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["change"], "added");
    }

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-9-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change"], "replaced");
    assert_eq!(body["discarded"], 2);
    assert_eq!(body["selection"]["native"], json!(["native-9-2"]));
    assert_eq!(body["selection"]["totalSelectedNativeAmount"], "50");
}

#[tokio::test]
async fn test_toggle_rejects_malformed_and_unknown_ids() {
    let test = setup_test_app(MockLedger::new().with_native(7, 100, 1)).await;

    let (status, _) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-seven-0" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-7-5" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_refuses_lock_that_has_not_matured() {
    let test = setup_test_app(MockLedger::new().with_native(7, 100, u64::MAX)).await;

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-7-0" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not matured"));

    let (_, body) = request(&test.app, "GET", "/v1/selection", None).await;
    assert_eq!(body["native"], json!([]));
}

#[tokio::test]
async fn test_pending_queue_conflict_is_refused() {
    let test =
        setup_test_app(MockLedger::new().with_fungible(0, 5, 1).with_fungible(7, 10, 1)).await;

    let (status, _) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "fungible-0-0" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "fungible-7-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pending queue"));
}

#[tokio::test]
async fn test_settle_then_selection_is_cleared() {
    let test =
        setup_test_app(MockLedger::new().with_native(7, 100, 1).with_native(7, 200, 1)).await;

    let body = Some(json!({ "ledger": "native" }));
    let (status, body) = request(&test.app, "POST", "/v1/selection/select-all", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["native"], json!(["native-7-0", "native-7-1"]));

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/settle",
        Some(json!({ "ledger": "native", "action": "withdrawToContract" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch"]["indices"], json!([0, 1]));
    assert_eq!(body["refreshed"], true);

    let (_, body) = request(&test.app, "GET", "/v1/selection", None).await;
    assert_eq!(body["native"], json!([]));
    assert_eq!(test.mock.submitted().len(), 1);
}

#[tokio::test]
async fn test_settle_errors_map_to_statuses() {
    let test = setup_test_app(MockLedger::new().with_native(7, 100, 1)).await;

    let (status, _) = request(
        &test.app,
        "POST",
        "/v1/settle",
        Some(json!({ "ledger": "native", "action": "withdrawToWallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-7-0" })),
    )
    .await;
    test.mock.set_rejection(Some("execution reverted"));
    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/settle",
        Some(json!({ "ledger": "native", "action": "withdrawToWallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("execution reverted"));
}

#[tokio::test]
async fn test_refresh_unavailable_is_503() {
    let test = setup_test_app(MockLedger::new().with_native(7, 100, 1)).await;
    test.mock.set_locks_unavailable(true);

    let (status, _) = request(&test.app, "POST", "/v1/refresh", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = request(&test.app, "GET", "/v1/locks", None).await;
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_estimate_endpoint() {
    let test = setup_test_app(MockLedger::new().with_native(7, 31_536_000, 1)).await;
    request(
        &test.app,
        "POST",
        "/v1/selection/toggle",
        Some(json!({ "id": "native-7-0" })),
    )
    .await;

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/estimate",
        Some(json!({ "duration": 2 * DAY })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duration"], 2 * DAY);
    // 31_536_000 * 10% * 2 days / 1 year = 17_280, minus 2.5% = 16_848
    assert_eq!(body["state"]["estimate"], json!({ "status": "known", "value": "16848" }));

    let (_, body) = request(&test.app, "GET", "/v1/estimate", None).await;
    assert_eq!(body["loading"], false);
}

#[tokio::test]
async fn test_invest_endpoint() {
    let test = setup_test_app(MockLedger::new().with_vault_balance(50)).await;

    let (status, body) = request(
        &test.app,
        "POST",
        "/v1/invest",
        Some(json!({ "tokenId": 7, "duration": 2 * DAY, "amount": "500", "useDeposit": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["amount"], "450");
    assert_eq!(test.mock.investments().len(), 1);
}
