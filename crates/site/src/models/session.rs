//! Session keys.
//!
//! The cookie session only carries a visitor key and OAuth handshake state;
//! everything else lives in the in-memory visitor context.

/// Session keys for visitor and sign-in data.
pub mod keys {
    /// Key for the visitor id that scopes all in-memory state.
    pub const VISITOR_ID: &str = "visitor_id";

    /// Key for Google OAuth state (CSRF protection).
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";

    /// Key for Google OAuth nonce (`OpenID` Connect replay protection).
    pub const GOOGLE_OAUTH_NONCE: &str = "google_oauth_nonce";

    /// Key for the local path to return to after sign-in.
    pub const RETURN_TO: &str = "return_to";
}
