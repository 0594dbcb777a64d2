//! Integration tests for plan selection and the payment callbacks.

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use dpicon_integration_tests::TestApp;
use serde_json::json;

// =============================================================================
// Plan Selector Tests
// =============================================================================

#[tokio::test]
async fn test_selector_opens_and_closes() {
    let app = TestApp::new();

    let modal = app.htmx_get("/plans").await;
    assert_eq!(modal.status, StatusCode::OK);
    assert!(modal.body.contains("Choose Your Plan"));
    assert!(modal.body.contains("data-plan-select=\"premium\""));
    assert_eq!(app.session().await["plans_open"], true);

    let closed = app.post("/plans/close").await;
    assert_eq!(closed.status, StatusCode::OK);
    assert!(closed.body.is_empty());
    assert_eq!(app.session().await["plans_open"], false);
}

#[tokio::test]
async fn test_free_plan_is_granted_without_payment_widget() {
    let app = TestApp::new();
    app.sign_in("/").await;
    app.htmx_get("/plans").await;

    let selection = app.post("/plans/basic/select").await;
    assert_eq!(selection.status, StatusCode::OK);
    let selection = selection.json();
    assert_eq!(selection["outcome"], "granted");
    assert_eq!(selection["credits"], 50);

    assert_eq!(app.gateway.loads.load(Ordering::SeqCst), 0);
    let session = app.session().await;
    assert_eq!(session["credits"], 50);
    assert_eq!(session["plans_open"], false);
}

#[tokio::test]
async fn test_unknown_plan_is_not_found() {
    let app = TestApp::new();

    let response = app.post("/plans/enterprise/select").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Paid Checkout Tests
// =============================================================================

#[tokio::test]
async fn test_paid_plan_returns_widget_options() {
    let app = TestApp::new();
    app.sign_in("/").await;

    let selection = app.post("/plans/pro/select").await.json();
    assert_eq!(selection["outcome"], "checkout");
    assert!(
        selection["receipt"]
            .as_str()
            .unwrap()
            .starts_with("receipt_")
    );
    assert_eq!(selection["options"]["amount"], 8000);
    assert_eq!(selection["options"]["currency"], "INR");
    assert_eq!(selection["options"]["prefill"]["name"], "Ada Lovelace");

    // nothing is granted until the widget reports back
    assert_eq!(app.session().await["credits"], 20);
}

#[tokio::test]
async fn test_script_failure_changes_nothing() {
    let app = TestApp::new();
    app.gateway.broken.store(true, Ordering::SeqCst);
    app.htmx_get("/plans").await;

    let selection = app.post("/plans/premium/select").await.json();
    assert_eq!(selection["outcome"], "unavailable");
    assert!(selection["message"].as_str().unwrap().contains("unavailable"));

    let session = app.session().await;
    assert_eq!(session["credits"], 50);
    assert_eq!(session["plans_open"], true);
}

#[tokio::test]
async fn test_successful_payment_grants_catalog_credits() {
    let app = TestApp::new();
    app.sign_in("/").await;
    app.htmx_get("/plans").await;

    let selection = app.post("/plans/pro/select").await.json();
    let response = app
        .post_json(
            "/checkout/complete",
            &json!({ "receipt": selection["receipt"], "payment_id": "pay_ABC" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["credits"], 1000);

    let session = app.session().await;
    assert_eq!(session["credits"], 1000);
    assert_eq!(session["plans_open"], false);

    let toasts = app.notifications().await;
    assert!(toasts.contains("Payment successful!"));
    assert!(toasts.contains("Payment ID: pay_ABC"));
}

#[tokio::test]
async fn test_payment_for_unopened_checkout_is_rejected() {
    let app = TestApp::new();
    app.sign_in("/").await;
    app.post("/plans/premium/select").await;

    let response = app
        .post_json(
            "/checkout/complete",
            &json!({ "receipt": "receipt_forged", "payment_id": "pay_X" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(app.session().await["credits"], 20);
}

#[tokio::test]
async fn test_receipt_cannot_be_redeemed_twice() {
    let app = TestApp::new();
    let selection = app.post("/plans/pro/select").await.json();
    let body = json!({ "receipt": selection["receipt"], "payment_id": "pay_1" });

    assert_eq!(app.post_json("/checkout/complete", &body).await.status, StatusCode::OK);
    assert_eq!(
        app.post_json("/checkout/complete", &body).await.status,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_failed_payment_closes_the_checkout() {
    let app = TestApp::new();
    app.htmx_get("/plans").await;
    let selection = app.post("/plans/pro/select").await.json();

    let failed = app
        .post_json(
            "/checkout/failed",
            &json!({ "receipt": selection["receipt"], "reason": "card declined" }),
        )
        .await;
    assert_eq!(failed.status, StatusCode::NO_CONTENT);

    let session = app.session().await;
    assert_eq!(session["credits"], 50);
    assert_eq!(session["plans_open"], true);

    let late = app
        .post_json(
            "/checkout/complete",
            &json!({ "receipt": selection["receipt"], "payment_id": "pay_late" }),
        )
        .await;
    assert_eq!(late.status, StatusCode::CONFLICT);
}
