//! CSP nonce middleware and policy.
//!
//! Every request gets a fresh nonce. Inline scripts in the templates carry it
//! and the `Content-Security-Policy` header built by [`policy`] allows only
//! those, plus the third-party origins the pages load from: the htmx and
//! motion CDNs, the Razorpay widget and Google profile pictures.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Script CDNs used by the base layout.
const SCRIPT_CDNS: &str = "https://cdn.jsdelivr.net https://unpkg.com";

/// Razorpay widget origins.
const CHECKOUT_SCRIPT: &str = "https://checkout.razorpay.com";
const CHECKOUT_FRAMES: &str = "https://api.razorpay.com https://checkout.razorpay.com";
const CHECKOUT_CONNECT: &str = "https://api.razorpay.com https://lumberjack.razorpay.com";
const CHECKOUT_IMAGES: &str = "https://cdn.razorpay.com";

/// Google account avatars.
const AVATAR_IMAGES: &str = "https://lh3.googleusercontent.com";

/// Hero video host.
const HERO_MEDIA: &str = "https://www.w3schools.com";

/// A CSP nonce value for inline scripts.
///
/// Each request gets a unique, cryptographically random nonce (128-bit, base64-encoded).
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Get the nonce value for use in templates.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Build the `Content-Security-Policy` value for a response.
///
/// `style-src` allows inline styles because the checkout widget injects
/// them. Without a nonce, inline scripts are not allowed at all.
#[must_use]
pub fn policy(nonce: Option<&CspNonce>) -> String {
    let script_nonce = nonce
        .filter(|n| !n.value().is_empty())
        .map(|n| format!(" 'nonce-{}'", n.value()))
        .unwrap_or_default();

    format!(
        "default-src 'none'; \
         script-src 'self'{script_nonce} {SCRIPT_CDNS} {CHECKOUT_SCRIPT}; \
         style-src 'self' 'unsafe-inline'; \
         font-src 'self'; \
         img-src 'self' data: {AVATAR_IMAGES} {CHECKOUT_IMAGES}; \
         media-src {HERO_MEDIA}; \
         connect-src 'self' {CHECKOUT_CONNECT}; \
         frame-src {CHECKOUT_FRAMES}; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' https://accounts.google.com; \
         frame-ancestors 'none'; \
         upgrade-insecure-requests"
    )
}

/// Middleware that generates a CSP nonce and stores it in request extensions.
///
/// Must run before `security_headers_middleware` so the nonce is available
/// when building the CSP header.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

/// Extractor to get the CSP nonce from request extensions.
///
/// # Example
///
/// ```ignore
/// async fn handler(nonce: CspNonce) -> impl IntoResponse {
///     MyTemplate { nonce: nonce.0, /* ... */ }
/// }
/// ```
impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!(
                "CSP nonce not found in request extensions - middleware may be misconfigured"
            );
            Self(String::new())
        }))
    }
}
