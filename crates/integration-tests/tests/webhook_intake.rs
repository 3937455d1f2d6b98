//! Webhook intake, driven through the full router: authentication,
//! deduplication, the no-credential skip path, and end-to-end sale
//! submission against a mocked POS API.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tillsync_bridge::db::{AuditLog, RetryQueue};
use tillsync_core::SyncStatus;
use tillsync_integration_tests::{
    ACCOUNT_ID, STORE_DOMAIN, TestApp, WEBHOOK_SECRET, body_json, bridge_config, sign,
    webhook_request,
};

async fn app_with_mock() -> (TestApp, MockServer) {
    let server = MockServer::start().await;
    let app = TestApp::new(bridge_config(&server.uri()));
    (app, server)
}

fn account_path(tail: &str) -> String {
    format!("/API/V3/Account/{ACCOUNT_ID}/{tail}")
}

fn order_body(id: i64) -> String {
    format!(
        r##"{{"id":{id},"name":"#1001","total_price":"20.00","currency":"USD","line_items":[{{"sku":"ABC","quantity":2,"price":"10.00","title":"Widget"}}]}}"##
    )
}

async fn mount_catalog_item(server: &MockServer, sku: &str, item_id: &str, avg_cost: &str) {
    Mock::given(method("GET"))
        .and(path(account_path("Item.json")))
        .and(query_param("customSku", sku))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Item": {"itemID": item_id, "customSku": sku, "avgCost": avg_cost}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(account_path(&format!("Item/{item_id}.json"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Item": {"itemID": item_id, "customSku": sku, "avgCost": avg_cost}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn liveness_and_readiness_answer_without_a_database() {
    let (app, _server) = app_with_mock().await;

    let response = app
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No pool configured: the readiness probe has nothing to check.
    let response = app
        .router()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejects_a_missing_shop_domain_header() {
    let (app, _server) = app_with_mock().await;
    let body = order_body(1001);

    let request = Request::post("/webhooks/orders-create")
        .header("x-shopify-hmac-sha256", sign(WEBHOOK_SECRET, body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_an_unknown_store() {
    let (app, _server) = app_with_mock().await;
    let body = order_body(1001);

    let request = Request::post("/webhooks/orders-create")
        .header("x-shopify-shop-domain", "unknown.example")
        .header("x-shopify-hmac-sha256", sign(WEBHOOK_SECRET, body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // Rejected deliveries are never recorded.
    assert!(app.audit.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejects_a_bad_signature() {
    let (app, _server) = app_with_mock().await;
    let body = order_body(1001);

    let request = Request::post("/webhooks/orders-create")
        .header("x-shopify-shop-domain", STORE_DOMAIN)
        .header("x-shopify-hmac-sha256", sign("wrong-secret", body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.audit.list().await.unwrap().is_empty());
    assert!(app.queue.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejects_a_signed_but_unparseable_body() {
    let (app, _server) = app_with_mock().await;

    let response = app
        .router()
        .oneshot(webhook_request("this is not an order"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.audit.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn defers_an_order_when_no_credential_is_cached() {
    let (app, _server) = app_with_mock().await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1001)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "skipped");

    // Recorded as skipped and queued with the raw products; line mapping
    // has not run yet.
    let history = app.audit.list().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncStatus::Skipped);

    let queued = app.queue.list().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempt.products.len(), 1);
    assert!(queued[0].attempt.sale_lines.is_empty());
}

#[tokio::test]
async fn syncs_an_order_end_to_end_with_recomputed_pricing() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    mount_catalog_item(&server, "ABC", "55", "4.00").await;

    // avgCost 4.00 at 20% margin prices the line at 5.00; two units at 7%
    // tax total 10.70.
    Mock::given(method("POST"))
        .and(path(account_path("Sale.json")))
        .and(body_partial_json(serde_json::json!({
            "customerID": "42",
            "completed": true,
            "enablePromotions": false,
            "calcTotal": "10.70",
            "SaleLines": {
                "SaleLine": [{"itemID": "55", "unitQuantity": 2, "unitPrice": "5.00"}]
            },
            "SalePayments": {"SalePayment": {"amount": "10.70", "paymentTypeID": "1"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Sale": {"saleID": "9001", "calcTotal": "10.70"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1001)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ack = body_json(response).await;
    assert_eq!(ack["status"], "synced");
    assert_eq!(ack["lsSaleId"], "9001");

    let history = app.audit.list().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncStatus::Success);
    assert_eq!(history[0].sale_id.as_deref(), Some("9001"));
    assert!(app.queue.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn deduplicates_a_redelivered_order() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    mount_catalog_item(&server, "ABC", "55", "4.00").await;
    Mock::given(method("POST"))
        .and(path(account_path("Sale.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Sale": {"saleID": "9001"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = app
        .router()
        .oneshot(webhook_request(&order_body(1001)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["status"], "synced");

    // Same order id again: acknowledged, but nothing is recorded or
    // submitted a second time.
    let second = app
        .router()
        .oneshot(webhook_request(&order_body(1001)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["status"], "duplicate");

    assert_eq!(app.audit.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn drops_unresolvable_lines_and_submits_the_rest() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    mount_catalog_item(&server, "GOOD-1", "55", "4.00").await;
    mount_catalog_item(&server, "GOOD-2", "56", "1.00").await;
    // No match for the third SKU.
    Mock::given(method("GET"))
        .and(path(account_path("Item.json")))
        .and(query_param("customSku", "GONE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(account_path("Sale.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Sale": {"saleID": "9002"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = r#"{"id":1002,"line_items":[
        {"sku":"GOOD-1","quantity":2,"price":"10.00"},
        {"sku":"GONE","quantity":1,"price":"3.00"},
        {"sku":"GOOD-2","quantity":1,"price":"2.00"}
    ]}"#;

    let response = app.router().oneshot(webhook_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "synced");

    // The audit record keeps all three products but only two resolved.
    let history = app.audit.list().await.unwrap();
    assert_eq!(history[0].products.len(), 3);
    assert_eq!(history[0].sale_lines.len(), 2);
    assert_eq!(history[0].sale_lines[0].item_id, "55");
    assert_eq!(history[0].sale_lines[1].item_id, "56");
}

#[tokio::test]
async fn records_an_order_with_no_resolvable_lines_without_queueing() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    Mock::given(method("GET"))
        .and(path(account_path("Item.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1003)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "no-syncable-items");

    let history = app.audit.list().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncStatus::Skipped);
    // Retrying would never help: the catalog simply has no such item.
    assert!(app.queue.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn an_item_without_usable_cost_keeps_the_storefront_price() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    // avgCost 0 and no defaultCost: pricing falls back to the 10.00 the
    // storefront charged. 2 x 10.00 at 7% tax totals 21.40.
    mount_catalog_item(&server, "ABC", "55", "0").await;
    Mock::given(method("POST"))
        .and(path(account_path("Sale.json")))
        .and(body_partial_json(serde_json::json!({
            "calcTotal": "21.40",
            "SaleLines": {
                "SaleLine": [{"itemID": "55", "unitQuantity": 2, "unitPrice": "10.00"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Sale": {"saleID": "9003"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1005)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "synced");
}

#[tokio::test]
async fn a_failed_refresh_during_submission_defers_the_order_as_skipped() {
    let (app, server) = app_with_mock().await;
    app.seed_token("stale", "rtk").await;

    // Lookup succeeds, but submission hits a 401 and the one allowed
    // refresh is rejected: a credential problem, not a sale problem.
    Mock::given(method("GET"))
        .and(path(account_path("Item.json")))
        .and(query_param("customSku", "ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Item": {"itemID": "55", "avgCost": "4.00"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(account_path("Item/55.json")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1006)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "skipped");

    // Skipped, not failed: a sweep re-submits once the credential is
    // repaired, from the already-resolved lines.
    let history = app.audit.list().await.unwrap();
    assert_eq!(history[0].status, SyncStatus::Skipped);

    let queued = app.queue.list().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempt.status, SyncStatus::Skipped);
    assert_eq!(queued[0].attempt.sale_lines.len(), 1);
}

#[tokio::test]
async fn a_failed_submission_answers_500_and_queues_the_attempt() {
    let (app, server) = app_with_mock().await;
    app.seed_token("atk", "rtk").await;

    mount_catalog_item(&server, "ABC", "55", "4.00").await;
    Mock::given(method("POST"))
        .and(path(account_path("Sale.json")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({"message": "register closed"})),
        )
        .mount(&server)
        .await;

    let response = app
        .router()
        .oneshot(webhook_request(&order_body(1004)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The sender sees a generic failure; the detail lands in the audit log
    // and the attempt is durably queued with its resolved lines.
    let ack = body_json(response).await;
    assert_eq!(ack["status"], "failed");
    assert!(ack.get("message").is_none());

    let history = app.audit.list().await.unwrap();
    assert_eq!(history[0].status, SyncStatus::Failed);
    assert!(history[0].error_message.is_some());
    assert_eq!(history[0].error_details.as_ref().unwrap()["httpCode"], 422);

    let queued = app.queue.list().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempt.sale_lines.len(), 1);
}
