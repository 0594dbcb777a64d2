//! Integration tests for the DPIcon site.
//!
//! Tests drive the full router in process with `tower::ServiceExt::oneshot`.
//! The identity provider and payment gateway are replaced with fakes, so no
//! network access is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dpicon-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session` - Sign-in, sign-out and the credit balance
//! - `checkout` - Plan selection and payment callbacks
//! - `face_fusion` - Upload, validation feedback and generation runs
//! - `pages` - Marketing pages, contact form and middleware

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use dpicon_core::{
    Email, IdentitySnapshot, Plan, ReceiptId, SubjectId, UserIdentity, VisitorId,
};
use dpicon_site::config::{SESSION_IDLE_TIMEOUT, SiteConfig};
use dpicon_site::content::ContentStore;
use dpicon_site::middleware::session::SESSION_COOKIE_NAME;
use dpicon_site::routes;
use dpicon_site::services::checkout::{
    CheckoutError, CheckoutNotes, CheckoutOptions, PaymentGateway, Prefill, Theme,
};
use dpicon_site::services::identity::{
    IdentityError, IdentityHub, IdentityProvider, IdentitySubscription,
};
use dpicon_site::state::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Generation delay and feedback window used by the test app, in ms.
pub const FAST_DELAY_MS: u64 = 100;

/// Largest accepted upload in the test app.
pub const MAX_UPLOAD_BYTES: usize = 1024;

/// Code the fake provider accepts.
pub const GOOD_CODE: &str = "good-code";

/// A tiny PNG header; the site only looks at the declared content type.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

// =============================================================================
// Fake Collaborators
// =============================================================================

/// Identity provider that signs everyone in as Ada Lovelace.
///
/// Only nonces it handed out through `authorization_url` are accepted.
pub struct FakeIdentity {
    hub: IdentityHub,
    pub sign_ins: AtomicUsize,
    /// Nonce the last `complete_sign_in` call carried.
    pub received_nonce: Mutex<Option<String>>,
    issued_nonces: Mutex<Vec<String>>,
}

impl FakeIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub: IdentityHub::new(SESSION_IDLE_TIMEOUT, 10_000),
            sign_ins: AtomicUsize::new(0),
            received_nonce: Mutex::new(None),
            issued_nonces: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn hub(&self) -> &IdentityHub {
        &self.hub
    }

    #[must_use]
    pub fn ada() -> UserIdentity {
        UserIdentity {
            subject: SubjectId::new("google-ada"),
            display_name: Some("Ada Lovelace".to_owned()),
            email: Email::parse("ada@example.com").ok(),
            avatar_url: None,
        }
    }
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        self.issued_nonces.lock().unwrap().push(nonce.to_owned());
        url::Url::parse_with_params(
            "https://accounts.example.test/auth",
            &[
                ("redirect_uri", redirect_uri),
                ("state", state),
                ("nonce", nonce),
            ],
        )
        .map(String::from)
        .unwrap()
    }

    async fn complete_sign_in(
        &self,
        visitor: &VisitorId,
        code: &str,
        _redirect_uri: &str,
        nonce: &str,
    ) -> Result<UserIdentity, IdentityError> {
        if code != GOOD_CODE {
            return Err(IdentityError::TokenExchange("invalid_grant".to_owned()));
        }
        *self.received_nonce.lock().unwrap() = Some(nonce.to_owned());
        if !self.issued_nonces.lock().unwrap().iter().any(|n| n == nonce) {
            return Err(IdentityError::NonceMismatch);
        }
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        let user = Self::ada();
        self.hub
            .publish(visitor, IdentitySnapshot::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self, visitor: &VisitorId) -> Result<(), IdentityError> {
        self.hub.publish(visitor, IdentitySnapshot::SignedOut);
        Ok(())
    }

    fn subscribe(&self, visitor: &VisitorId) -> IdentitySubscription {
        self.hub.subscribe(visitor)
    }
}

/// Payment gateway whose script can be made unreachable.
#[derive(Default)]
pub struct FakeGateway {
    pub broken: AtomicBool,
    pub loads: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn script_url(&self) -> &str {
        "https://checkout.example.test/v1/checkout.js"
    }

    async fn load_script(&self) -> Result<(), CheckoutError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            Err(CheckoutError::ScriptUnavailable("offline".to_owned()))
        } else {
            Ok(())
        }
    }

    fn checkout_options(
        &self,
        plan: &Plan,
        receipt: &ReceiptId,
        customer: Option<&UserIdentity>,
    ) -> Result<CheckoutOptions, CheckoutError> {
        Ok(CheckoutOptions {
            key: "rzp_test_key".to_owned(),
            amount: plan
                .price
                .minor_units()
                .ok_or(CheckoutError::InvalidAmount(plan.id))?,
            currency: "INR".to_owned(),
            name: "DPIcon".to_owned(),
            description: format!("{} Plan", plan.name),
            image: "/static/images/avatar.svg".to_owned(),
            prefill: Prefill {
                name: customer
                    .map(|c| c.display_name_or_default().to_owned())
                    .unwrap_or_default(),
                email: String::new(),
            },
            notes: CheckoutNotes {
                plan: plan.id.to_string(),
                receipt: receipt.to_string(),
            },
            theme: Theme {
                color: "#9333ea".to_owned(),
            },
        })
    }
}

// =============================================================================
// Test App
// =============================================================================

/// The site crate, for its content and static trees.
fn site_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../site")
}

/// Test configuration with short timings.
#[must_use]
pub fn test_config() -> SiteConfig {
    let delay = FAST_DELAY_MS.to_string();
    let max_upload = MAX_UPLOAD_BYTES.to_string();
    let static_dir = site_dir().join("static").display().to_string();
    let env = HashMap::from([
        ("SITE_BASE_URL", "http://localhost:3000"),
        ("GOOGLE_CLIENT_ID", "1234.apps.googleusercontent.com"),
        ("GOOGLE_CLIENT_SECRET", "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"),
        ("RAZORPAY_KEY_ID", "rzp_test_1DP5mmOlF5G5ag"),
        ("FACE_FUSION_GENERATION_DELAY_MS", delay.as_str()),
        ("FACE_FUSION_FEEDBACK_CLEAR_MS", delay.as_str()),
        ("FACE_FUSION_MAX_UPLOAD_BYTES", max_upload.as_str()),
        ("SITE_STATIC_DIR", static_dir.as_str()),
    ]);
    SiteConfig::from_lookup(|key| env.get(key).map(|v| (*v).to_owned())).unwrap()
}

/// A captured response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    #[must_use]
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

/// One browser talking to a fresh site instance.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub identity: Arc<FakeIdentity>,
    pub gateway: Arc<FakeGateway>,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let content = ContentStore::load(&site_dir().join("content")).unwrap();
        let identity = Arc::new(FakeIdentity::new());
        let gateway = Arc::new(FakeGateway::default());

        let state = AppState::with_collaborators(
            config,
            content,
            identity.clone(),
            gateway.clone(),
        );

        Self {
            router: routes::app(state.clone()),
            state,
            identity,
            gateway,
            cookie: Mutex::new(None),
        }
    }

    /// Send a request, carrying the session cookie across calls.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        let headers = request.headers_mut();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            headers.insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        let prefix = format!("{SESSION_COOKIE_NAME}=");
        if let Some(cookie) = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&prefix))
        {
            let pair = cookie.split(';').next().unwrap_or_default().to_owned();
            *self.cookie.lock().unwrap() = Some(pair);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// GET issued by htmx.
    pub async fn htmx_get(&self, path: &str) -> TestResponse {
        self.send(
            Request::get(path)
                .header("hx-request", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.send(Request::post(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&self, path: &str, body: &str) -> TestResponse {
        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("hx-request", "true")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> TestResponse {
        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Multipart POST. `htmx` controls whether the request looks like it
    /// came from htmx or a plain form submission.
    pub async fn post_multipart(&self, path: &str, form: &MultipartForm, htmx: bool) -> TestResponse {
        let mut builder = Request::post(path).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if htmx {
            builder = builder.header("hx-request", "true");
        }
        self.send(builder.body(Body::from(form.encode())).unwrap())
            .await
    }

    /// Visitor state as served to the browser.
    pub async fn session(&self) -> serde_json::Value {
        self.get("/api/session").await.json()
    }

    /// Start sign-in and return the `state` the provider would echo back.
    pub async fn begin_sign_in(&self, return_to: &str) -> String {
        let response = self
            .get(&format!("/auth/google/login?return_to={return_to}"))
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        let url = url::Url::parse(response.location()).unwrap();
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    /// Run the whole sign-in round trip and return the callback response.
    pub async fn sign_in(&self, return_to: &str) -> TestResponse {
        let state = self.begin_sign_in(return_to).await;
        self.get(&format!(
            "/auth/google/callback?code={GOOD_CODE}&state={state}"
        ))
        .await
    }

    pub async fn sign_out(&self) -> TestResponse {
        self.post("/auth/logout").await
    }

    /// Drain queued toasts.
    pub async fn notifications(&self) -> String {
        self.htmx_get("/notifications").await.body
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Multipart
// =============================================================================

const BOUNDARY: &str = "dpicon-test-boundary";

/// A small multipart/form-data builder.
#[derive(Debug, Default)]
pub struct MultipartForm {
    parts: Vec<(String, Option<(String, String)>, Vec<u8>)>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts
            .push((name.to_owned(), None, value.as_bytes().to_vec()));
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.parts.push((
            name.to_owned(),
            Some((file_name.to_owned(), content_type.to_owned())),
            bytes.to_vec(),
        ));
        self
    }

    /// A PNG image plus a prompt.
    #[must_use]
    pub fn complete(prompt: &str) -> Self {
        Self::new()
            .file("image", "me.png", "image/png", PNG)
            .text("prompt", prompt)
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, bytes) in &self.parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}
