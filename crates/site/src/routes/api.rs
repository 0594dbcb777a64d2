//! JSON API handlers.

use axum::Json;
use tracing::instrument;

use crate::middleware::KnownVisitor;
use crate::services::session::HeaderView;

/// The visitor's identity and credits, as shown in the top bar.
///
/// GET /api/session
///
/// A client without a session gets the signed-out default.
#[instrument(skip_all)]
pub async fn session(visitor: KnownVisitor) -> Json<HeaderView> {
    Json(visitor.header().await)
}
