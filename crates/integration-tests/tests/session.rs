//! Integration tests for sign-in, sign-out and the credit balance.

use axum::http::StatusCode;
use dpicon_integration_tests::TestApp;
use serde_json::json;

// =============================================================================
// Credit Balance Tests
// =============================================================================

#[tokio::test]
async fn test_new_visitor_is_signed_out_with_starter_credits() {
    let app = TestApp::new();

    let session = app.session().await;
    assert_eq!(session["status"], "signed_out");
    assert_eq!(session["signed_in"], false);
    assert_eq!(session["loading"], false);
    assert_eq!(session["credits"], 50);
}

#[tokio::test]
async fn test_sign_in_sets_exactly_twenty_credits() {
    let app = TestApp::new();

    let response = app.sign_in("/").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/");

    let session = app.session().await;
    assert_eq!(session["status"], "signed_in");
    assert_eq!(session["credits"], 20);
    assert_eq!(session["first_name"], "Ada");
    assert_eq!(session["email"], "ada@example.com");
}

#[tokio::test]
async fn test_purchased_credits_reset_on_sign_out_and_sign_in() {
    let app = TestApp::new();
    app.sign_in("/").await;

    let selection = app.post("/plans/premium/select").await.json();
    assert_eq!(selection["outcome"], "checkout");
    let complete = app
        .post_json(
            "/checkout/complete",
            &json!({ "receipt": selection["receipt"], "payment_id": "pay_123" }),
        )
        .await;
    assert_eq!(complete.status, StatusCode::OK);
    assert_eq!(app.session().await["credits"], 12000);

    let response = app.sign_out().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/");
    let session = app.session().await;
    assert_eq!(session["signed_in"], false);
    assert_eq!(session["credits"], 50);

    app.sign_in("/").await;
    assert_eq!(app.session().await["credits"], 20);
}

// =============================================================================
// Sign-in Failure Tests
// =============================================================================

#[tokio::test]
async fn test_rejected_code_returns_visitor_signed_out() {
    let app = TestApp::new();
    let state = app.begin_sign_in("/contact").await;

    let response = app
        .get(&format!("/auth/google/callback?code=stolen&state={state}"))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/contact");
    assert_eq!(app.session().await["signed_in"], false);
}

#[tokio::test]
async fn test_state_mismatch_is_refused() {
    let app = TestApp::new();
    app.begin_sign_in("/").await;

    let response = app
        .get("/auth/google/callback?code=good-code&state=forged")
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(app.session().await["signed_in"], false);
    assert_eq!(
        app.identity
            .sign_ins
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_callback_uses_the_nonce_sent_to_the_provider() {
    let app = TestApp::new();

    let login = app.get("/auth/google/login?return_to=/").await;
    let url = url::Url::parse(login.location()).unwrap();
    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    };
    let (state, nonce) = (param("state"), param("nonce"));

    app.get(&format!("/auth/google/callback?code=good-code&state={state}"))
        .await;
    assert_eq!(
        app.identity.received_nonce.lock().unwrap().as_deref(),
        Some(nonce.as_str())
    );
    assert_eq!(app.session().await["signed_in"], true);

    // the handshake is single use
    app.sign_out().await;
    app.get(&format!("/auth/google/callback?code=good-code&state={state}"))
        .await;
    assert_eq!(app.session().await["signed_in"], false);
}

#[tokio::test]
async fn test_provider_error_is_not_an_error_page() {
    let app = TestApp::new();
    let state = app.begin_sign_in("/face-fusion").await;

    let response = app
        .get(&format!("/auth/google/callback?error=access_denied&state={state}"))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/face-fusion");
}

#[tokio::test]
async fn test_offsite_return_target_is_ignored() {
    let app = TestApp::new();

    let response = app.sign_in("//evil.example").await;
    assert_eq!(response.location(), "/");
}

// =============================================================================
// Header Rendering Tests
// =============================================================================

#[tokio::test]
async fn test_header_shows_sign_in_then_welcome() {
    let app = TestApp::new();

    let page = app.get("/").await;
    assert!(page.body.contains("Sign In"));
    assert!(!page.body.contains("Welcome Ada"));

    app.sign_in("/").await;
    let page = app.get("/").await;
    assert!(page.body.contains("Welcome Ada"));
    assert!(page.body.contains("Upgrade"));
    assert!(page.body.contains(">20<"));
}
