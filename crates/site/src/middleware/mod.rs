//! HTTP middleware stack for the site.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions over a bounded in-memory store)
//! 5. CSP nonce (generate per-request nonce for inline scripts)
//! 6. Security headers (CSP, COOP, etc.)
//! 7. Rate limiting (governor, per route group)
//!
//! The [`Visitor`] extractor resolves the cookie session to the visitor's
//! in-memory context, minting one when needed. Read-only pages use
//! [`KnownVisitor`], which never mints.

pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod visitor;

pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use visitor::{KnownVisitor, Visitor};
