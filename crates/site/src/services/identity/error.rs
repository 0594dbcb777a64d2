//! Identity provider error types.

use thiserror::Error;

/// Errors that can occur while talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the authorization code.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The ID token was not issued for this sign-in attempt.
    #[error("ID token nonce does not match")]
    NonceMismatch,

    /// The ID token could not be read.
    #[error("malformed ID token: {0}")]
    IdToken(String),

    /// The provider would not return the user's profile.
    #[error("userinfo request failed: {0}")]
    UserInfo(String),

    /// Token revocation failed. The local sign-out still happened.
    #[error("token revocation failed: {0}")]
    Revocation(String),
}
