//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::checkout::CheckoutError;
use crate::services::generation::UploadError;
use crate::services::identity::IdentityError;

/// Application-level error type for the site.
#[derive(Debug, Error)]
pub enum AppError {
    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Uploaded image was rejected.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Cookie session could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        let capture = match &self {
            Self::Identity(_) | Self::Session(_) | Self::Internal(_) => true,
            Self::Checkout(err) => !matches!(err, CheckoutError::UnknownCheckout(_)),
            _ => false,
        };
        if capture {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Identity(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => match err {
                CheckoutError::UnknownCheckout(_) => StatusCode::CONFLICT,
                CheckoutError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                CheckoutError::ScriptUnavailable(_) | CheckoutError::Http(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upload(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Identity(_) => "Sign-in service error".to_string(),
            Self::Checkout(CheckoutError::UnknownCheckout(_)) => {
                "This payment does not match an open checkout".to_string()
            }
            Self::Checkout(_) => "Payment service error".to_string(),
            Self::Upload(err) => err.to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Checkout opened", Some(&[("plan", "pro")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpicon_core::{PlanId, ReceiptId};

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("page-123".to_string());
        assert_eq!(err.to_string(), "Not found: page-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_status_codes() {
        assert_eq!(
            get_status(CheckoutError::UnknownCheckout(ReceiptId::new("r")).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::InvalidAmount(PlanId::Basic).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_upload_errors_are_bad_requests() {
        assert_eq!(
            get_status(UploadError::TooLarge { max: 1 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(UploadError::NotAnImage("text/plain".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
