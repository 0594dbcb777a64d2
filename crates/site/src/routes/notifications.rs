//! Toast notifications fragment.
//!
//! The base layout polls this endpoint and also fetches it whenever a
//! response carries `HX-Trigger: notify`. Each toast is shown once.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::middleware::KnownVisitor;
use crate::models::Notification;

/// Toasts fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/notifications.html")]
pub struct NotificationsTemplate {
    pub notifications: Vec<Notification>,
}

/// Drain the visitor's queued toasts.
#[instrument(skip_all)]
pub async fn drain(visitor: KnownVisitor) -> impl IntoResponse {
    let notifications = match &visitor.0 {
        Some(visitor) => visitor.context.lock().await.notifications.drain(),
        None => Vec::new(),
    };
    if !notifications.is_empty() {
        tracing::debug!(count = notifications.len(), "notifications delivered");
    }
    NotificationsTemplate { notifications }
}
