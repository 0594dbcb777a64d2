//! HTTP route handlers for the site.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Health check
//!
//! # Face Fusion (HTMX fragments)
//! GET  /face-fusion               - Product page (?resume=1 after sign-in)
//! POST /face-fusion/upload        - Upload image (returns generator fragment)
//! POST /face-fusion/prompt        - Update prompt (204)
//! POST /face-fusion/generate      - Generate (returns generator fragment, triggers notify)
//! GET  /face-fusion/status        - Generator fragment, polled while in flight
//! POST /face-fusion/dialog/close  - Dismiss the sign-in dialog
//!
//! # Marketing pages
//! GET  /sponsor                   - Markdown content page
//! GET  /services                  - Services
//! GET  /about                     - About
//! GET  /contact                   - Contact page
//! POST /contact                   - Contact form
//!
//! # Plans & checkout
//! GET  /plans                     - Open plan selector (fragment)
//! POST /plans/close               - Close plan selector
//! POST /plans/{id}/select         - Select plan (JSON outcome)
//! POST /checkout/complete         - Widget success callback (JSON)
//! POST /checkout/failed           - Widget failure report (JSON)
//!
//! # Auth
//! GET  /auth/google/login         - Redirect to Google
//! GET  /auth/google/callback      - Handle OAuth callback
//! POST /auth/logout               - Sign out
//!
//! # Misc
//! GET  /notifications             - Drain queued toasts (fragment)
//! GET  /api/session               - Header view (JSON)
//! ```

pub mod api;
pub mod auth;
pub mod checkout;
pub mod contact;
pub mod face_fusion;
pub mod home;
pub mod notifications;
pub mod pages;
pub mod plans;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::HeaderMap,
    middleware::from_fn,
    routing::{get, post},
};
use dpicon_core::{Plan, catalog};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    CspNonce, api_rate_limiter, auth_rate_limiter, create_session_layer, csp_nonce_middleware,
    request_id_middleware, security_headers_middleware,
};
use crate::services::session::HeaderView;
use crate::state::AppState;

/// Room for multipart framing and the prompt field on top of the image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Header htmx sends with every request it makes.
const HX_REQUEST: &str = "hx-request";

/// Whether the request came from htmx rather than a plain form post.
pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .is_some_and(|value| value.as_bytes() == b"true")
}

// =============================================================================
// Page shell
// =============================================================================

/// Sidebar entry.
#[derive(Clone, Debug)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

/// Which sidebar entry is highlighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nav {
    Home,
    FaceFusion,
    Sponsor,
    None,
}

impl Nav {
    /// Where sign-in returns to from this page.
    const fn path(self) -> &'static str {
        match self {
            Self::FaceFusion => "/face-fusion",
            Self::Sponsor => "/sponsor",
            Self::Home | Self::None => "/",
        }
    }

    fn links(self) -> Vec<NavLink> {
        [
            (Self::Home, "Home", "/"),
            (Self::FaceFusion, "Face Fusion", "/face-fusion"),
            (Self::Sponsor, "Sponsor", "/sponsor"),
        ]
        .into_iter()
        .map(|(item, label, href)| NavLink {
            label,
            href,
            active: item == self,
        })
        .collect()
    }
}

/// Plan card display data for the selector.
#[derive(Clone, Debug)]
pub struct PlanCard {
    pub id: &'static str,
    pub name: &'static str,
    pub credits: String,
    pub price: String,
    pub period: String,
    pub features: &'static [&'static str],
    pub popular: bool,
    pub free: bool,
    pub button_label: &'static str,
}

impl From<&Plan> for PlanCard {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id.as_str(),
            name: plan.name,
            credits: plan.credits.grouped(),
            price: plan.price.to_string(),
            period: format!("per {}", plan.period.label()),
            features: plan.features,
            popular: plan.popular,
            free: plan.is_free(),
            button_label: plan.button_label(),
        }
    }
}

/// Plan cards in catalog order.
#[must_use]
pub fn plan_cards() -> Vec<PlanCard> {
    catalog().iter().map(PlanCard::from).collect()
}

/// Everything the base layout needs: sidebar, top bar and plan selector.
#[derive(Clone, Debug)]
pub struct Shell {
    pub nonce: String,
    pub header: HeaderView,
    pub nav: Vec<NavLink>,
    pub return_to: &'static str,
    pub plans: Vec<PlanCard>,
    pub checkout_script_url: String,
}

impl Shell {
    #[must_use]
    pub fn new(state: &AppState, nonce: CspNonce, nav: Nav, header: HeaderView) -> Self {
        Self {
            nonce: nonce.0,
            header,
            nav: nav.links(),
            return_to: nav.path(),
            plans: plan_cards(),
            checkout_script_url: state.checkout().script_url().to_owned(),
        }
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Create the Face Fusion routes router.
///
/// Bodies are capped a little above the configured upload limit so an
/// oversized image is refused before it is buffered.
pub fn face_fusion_routes(max_upload_bytes: usize) -> Router<AppState> {
    let actions = Router::new()
        .route("/upload", post(face_fusion::upload))
        .route("/prompt", post(face_fusion::prompt))
        .route("/generate", post(face_fusion::generate))
        .route("/dialog/close", post(face_fusion::close_dialog))
        .layer(api_rate_limiter())
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ));

    Router::new()
        .route("/", get(face_fusion::show))
        .route("/status", get(face_fusion::status))
        .merge(actions)
}

/// Create the plan selector and checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(plans::open))
        .route("/plans/close", post(plans::close))
        .route("/plans/{id}/select", post(checkout::select))
        .route("/checkout/complete", post(checkout::complete))
        .route("/checkout/failed", post(checkout::failed))
        .layer(api_rate_limiter())
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/google/login", get(auth::login))
        .route("/google/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create all routes for the site.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/sponsor", get(pages::sponsor))
        .route("/services", get(pages::services))
        .route("/about", get(pages::about))
        .route("/contact", get(contact::show).post(contact::submit))
        .route("/notifications", get(notifications::drain))
        .route("/api/session", get(api::session))
        .nest("/face-fusion", face_fusion_routes(max_upload_bytes))
        .nest("/auth", auth_routes())
        .merge(checkout_routes())
}

/// Build the complete application: routes, static files and middleware.
///
/// Sentry layers are added by the binary so tests can run without a hub.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config(), state.session_store().clone());
    let static_dir = state.config().static_dir.clone();

    Router::new()
        .route("/health", get(health))
        .merge(routes(state.generation().max_upload_bytes()))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    visitor = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check collaborators.
pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_marks_one_active_link() {
        let links = Nav::FaceFusion.links();
        assert_eq!(links.len(), 3);
        let active: Vec<_> = links.iter().filter(|l| l.active).map(|l| l.href).collect();
        assert_eq!(active, vec!["/face-fusion"]);

        assert!(Nav::None.links().iter().all(|l| !l.active));
    }

    #[test]
    fn test_plan_cards_follow_catalog() {
        let cards = plan_cards();
        let ids: Vec<_> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["basic", "pro", "premium"]);

        let premium = &cards[2];
        assert_eq!(premium.credits, "12,000");
        assert_eq!(premium.price, "₹900");
        assert_eq!(premium.period, "per year");
        assert!(cards[0].free);
        assert_eq!(cards[0].price, "Free");
        assert_eq!(cards[0].button_label, "Current Plan");
        assert!(cards[1].popular);
    }

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert(HX_REQUEST, "true".parse().unwrap());
        assert!(is_htmx(&headers));
    }
}
