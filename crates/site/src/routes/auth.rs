//! Google sign-in route handlers.
//!
//! Handles the OAuth flow against the identity provider:
//! - Login: Redirects to Google's authorization page
//! - Callback: Exchanges the code; the provider publishes the new identity
//! - Logout: Signs the visitor out; the provider publishes `SignedOut`
//!
//! Failures never produce an error page. They are logged and the visitor is
//! sent back where they came from.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::Visitor;
use crate::models::session_keys;
use crate::state::AppState;

/// Path of the OAuth callback, relative to the site's base URL.
const CALLBACK_PATH: &str = "/auth/google/callback";

/// Page that can resume a generation interrupted by sign-in.
const FACE_FUSION_PATH: &str = "/face-fusion";

/// Query parameters for starting sign-in.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Local path to return to afterwards.
    pub return_to: Option<String>,
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
}

/// 256 random bits, URL-safe.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Accept only local absolute paths as redirect targets.
fn local_path(candidate: Option<String>) -> String {
    candidate
        .filter(|path| path.starts_with('/') && !path.starts_with("//") && !path.contains('\\'))
        .unwrap_or_else(|| "/".to_owned())
}

/// Take a one-time handshake value out of the session.
async fn take(session: &Session, key: &str) -> Option<String> {
    match session.remove::<String>(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, key, "failed to read sign-in handshake from session");
            None
        }
    }
}

/// Remember the handshake values until the callback.
async fn store_handshake(
    session: &Session,
    oauth_state: &str,
    nonce: &str,
    return_to: &str,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::GOOGLE_OAUTH_STATE, oauth_state)
        .await?;
    session.insert(session_keys::GOOGLE_OAUTH_NONCE, nonce).await?;
    session.insert(session_keys::RETURN_TO, return_to).await
}

/// Initiate Google sign-in.
///
/// Generates state and nonce parameters, stores them in the session,
/// and redirects to Google's authorization page.
///
/// # Route
///
/// `GET /auth/google/login`
#[instrument(skip(state, visitor, query), fields(visitor = %visitor.id))]
pub async fn login(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<LoginQuery>,
) -> Response {
    let oauth_state = random_token();
    let nonce = random_token();
    let return_to = local_path(query.return_to);

    if let Err(e) = store_handshake(&visitor.session, &oauth_state, &nonce, &return_to).await {
        tracing::error!(error = %e, "failed to store sign-in handshake in session");
        return Redirect::to(&return_to).into_response();
    }

    let redirect_uri = state.config().absolute_url(CALLBACK_PATH);
    let auth_url = state
        .identity()
        .authorization_url(&redirect_uri, &oauth_state, &nonce);

    Redirect::to(&auth_url).into_response()
}

/// Handle the Google OAuth callback.
///
/// Validates the state parameter and completes sign-in with the stored
/// nonce. When a generation was waiting for this sign-in and the visitor
/// started it from Face Fusion, they are sent back to resume it; otherwise
/// the waiting generation is forgotten.
///
/// # Route
///
/// `GET /auth/google/callback`
#[instrument(skip(state, visitor, query), fields(visitor = %visitor.id))]
pub async fn callback(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let session = &visitor.session;

    // one-time handshake values
    let stored_state = take(session, session_keys::GOOGLE_OAUTH_STATE).await;
    let stored_nonce = take(session, session_keys::GOOGLE_OAUTH_NONCE).await;
    let return_to = local_path(take(session, session_keys::RETURN_TO).await);

    let code = match (query.error, query.code, query.state) {
        (Some(error), _, _) => {
            tracing::warn!(error = %error, "Google sign-in was denied");
            None
        }
        (None, Some(code), Some(returned)) if stored_state.as_ref() == Some(&returned) => {
            Some(code)
        }
        (None, None, _) => {
            tracing::warn!("Google callback missing code");
            None
        }
        _ => {
            tracing::warn!("Google callback state mismatch");
            None
        }
    };

    let handshake = match (code, stored_nonce) {
        (Some(code), Some(nonce)) => Some((code, nonce)),
        (Some(_), None) => {
            tracing::warn!("Google callback without a stored nonce");
            None
        }
        (None, _) => None,
    };

    let signed_in = match handshake {
        Some((code, nonce)) => {
            let redirect_uri = state.config().absolute_url(CALLBACK_PATH);
            match state
                .identity()
                .complete_sign_in(&visitor.id, &code, &redirect_uri, &nonce)
                .await
            {
                Ok(user) => {
                    set_sentry_user(&user.subject, user.email.as_ref().map(|e| e.as_str()));
                    tracing::info!(subject = %user.subject, "signed in");
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Google sign-in failed");
                    false
                }
            }
        }
        None => false,
    };

    let mut guard = visitor.context.lock().await;
    if signed_in && return_to == FACE_FUSION_PATH && guard.generation.resume_pending() {
        return Redirect::to("/face-fusion?resume=1").into_response();
    }

    state.generation().close_dialog(&mut guard);
    Redirect::to(&return_to).into_response()
}

/// Sign out.
///
/// # Route
///
/// `POST /auth/logout`
#[instrument(skip(state, visitor), fields(visitor = %visitor.id))]
pub async fn logout(State(state): State<AppState>, visitor: Visitor) -> Response {
    if let Err(e) = state.identity().sign_out(&visitor.id).await {
        tracing::warn!(error = %e, "sign-out failed");
    }
    clear_sentry_user();

    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_rejects_offsite_targets() {
        assert_eq!(local_path(Some("/face-fusion".to_owned())), "/face-fusion");
        assert_eq!(local_path(Some("//evil.example".to_owned())), "/");
        assert_eq!(local_path(Some("https://evil.example".to_owned())), "/");
        assert_eq!(local_path(Some("/\\evil.example".to_owned())), "/");
        assert_eq!(local_path(None), "/");
    }

    #[test]
    fn test_random_tokens_differ() {
        let a = random_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, random_token());
    }
}
