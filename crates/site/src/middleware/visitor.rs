//! Visitor extractors.
//!
//! Resolves the cookie session to a stable [`VisitorId`] and the visitor's
//! in-memory [`SessionContext`]. [`Visitor`] mints an id on the first
//! request that changes visitor state. [`KnownVisitor`] only looks one up,
//! so rendering a page for a cookie-less client stores nothing.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use dpicon_core::VisitorId;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::session_keys;
use crate::services::session::{HeaderView, SessionContext};
use crate::state::AppState;

/// The visitor making the request.
///
/// # Example
///
/// ```ignore
/// async fn handler(visitor: Visitor) -> impl IntoResponse {
///     let header = visitor.context.header().await;
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct Visitor {
    pub id: VisitorId,
    pub context: Arc<SessionContext>,
    pub session: Session,
}

async fn cookie_session(parts: &mut Parts, state: &AppState) -> Result<Session, AppError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AppError::Internal(msg.to_string()))
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = cookie_session(parts, state).await?;

        let id = if let Some(id) = session.get::<VisitorId>(session_keys::VISITOR_ID).await? {
            id
        } else {
            let id = VisitorId::new(Uuid::new_v4().to_string());
            session.insert(session_keys::VISITOR_ID, &id).await?;
            tracing::debug!(visitor = %id, "new visitor");
            id
        };

        tracing::Span::current().record("visitor", id.as_str());
        let context = state.sessions().context(&id).await;

        Ok(Self {
            id,
            context,
            session,
        })
    }
}

/// The visitor making the request, if their session already names one.
///
/// A returning visitor whose context has idled out gets a fresh one, the
/// same as with [`Visitor`].
pub struct KnownVisitor(pub Option<Visitor>);

impl KnownVisitor {
    /// Header view, or the signed-out default for an unknown visitor.
    pub async fn header(&self) -> HeaderView {
        match &self.0 {
            Some(visitor) => visitor.context.header().await,
            None => HeaderView::signed_out(),
        }
    }
}

impl FromRequestParts<AppState> for KnownVisitor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = cookie_session(parts, state).await?;
        let Some(id) = session.get::<VisitorId>(session_keys::VISITOR_ID).await? else {
            return Ok(Self(None));
        };

        tracing::Span::current().record("visitor", id.as_str());
        let context = state.sessions().context(&id).await;

        Ok(Self(Some(Visitor {
            id,
            context,
            session,
        })))
    }
}
