//! Plan selector route handlers.
//!
//! The selector is a modal fragment swapped into `#plans-slot`. Whether it
//! is open is part of the visitor's state, so a full page render after a
//! free-plan grant or a payment shows it closed.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::{Html, IntoResponse};
use tracing::instrument;

use crate::middleware::Visitor;

use super::{PlanCard, plan_cards};

/// Plan selector modal fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/plans_modal.html")]
pub struct PlansModalTemplate {
    pub plans: Vec<PlanCard>,
}

/// Open the plan selector.
#[instrument(skip(visitor), fields(visitor = %visitor.id))]
pub async fn open(visitor: Visitor) -> impl IntoResponse {
    visitor.context.lock().await.open_plans();
    PlansModalTemplate {
        plans: plan_cards(),
    }
}

/// Close the plan selector. Returns an empty fragment.
#[instrument(skip(visitor), fields(visitor = %visitor.id))]
pub async fn close(visitor: Visitor) -> impl IntoResponse {
    visitor.context.lock().await.close_plans();
    Html("")
}
