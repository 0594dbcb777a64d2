//! Identity provider seam.
//!
//! The site never authenticates anyone itself. A provider runs the
//! interactive sign-in, owns the persisted identity, and announces every
//! change as a complete [`IdentitySnapshot`] through an [`IdentityHub`].
//! Visitor contexts hold an [`IdentitySubscription`] and apply whatever
//! arrived before each read.
//!
//! # Flow
//!
//! 1. `authorization_url()` sends the visitor to the provider
//! 2. The provider redirects back with a code
//! 3. `complete_sign_in()` exchanges it, checks the nonce and publishes `SignedIn`
//! 4. `sign_out()` publishes `SignedOut`

mod error;
pub mod google;
mod hub;

pub use error::IdentityError;
pub use google::GoogleIdentityProvider;
pub use hub::{IdentityHub, IdentitySubscription};

use async_trait::async_trait;
use dpicon_core::{UserIdentity, VisitorId};

/// An external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL that starts the interactive sign-in flow.
    fn authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String;

    /// Finish sign-in with the code from the provider's callback and publish
    /// the new identity to the visitor's subscribers.
    ///
    /// `nonce` is the value passed to [`IdentityProvider::authorization_url`]
    /// for this attempt; tokens issued for any other attempt are refused.
    async fn complete_sign_in(
        &self,
        visitor: &VisitorId,
        code: &str,
        redirect_uri: &str,
        nonce: &str,
    ) -> Result<UserIdentity, IdentityError>;

    /// Sign the visitor out and publish `SignedOut`.
    async fn sign_out(&self, visitor: &VisitorId) -> Result<(), IdentityError>;

    /// Start receiving this visitor's identity snapshots.
    fn subscribe(&self, visitor: &VisitorId) -> IdentitySubscription;
}
