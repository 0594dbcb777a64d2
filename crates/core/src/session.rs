//! Per-visitor session state driven by identity-provider snapshots.
//!
//! This is the pure half of the session store: it knows how a snapshot
//! changes the visible state, but not where snapshots come from. The site
//! crate owns the subscription and feeds snapshots in arrival order.

use serde::Serialize;

use crate::types::{AuthStatus, Credits, IdentitySnapshot, UserIdentity};

/// Identity and credit balance for one visitor.
///
/// ```
/// use dpicon_core::{Credits, IdentitySnapshot, SessionState};
///
/// let mut state = SessionState::new();
/// assert!(state.is_loading());
///
/// state.apply(IdentitySnapshot::SignedOut);
/// assert_eq!(state.credits(), Credits::SIGNED_OUT_DEFAULT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    status: AuthStatus,
    user: Option<UserIdentity>,
    credits: Credits,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh state that has not heard from the provider yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: AuthStatus::Unknown,
            user: None,
            credits: Credits::SIGNED_OUT_DEFAULT,
        }
    }

    /// Apply one provider snapshot.
    ///
    /// Every snapshot replaces the whole state and resets the balance to the
    /// default for the new status, including a re-emitted snapshot for the
    /// same user. Returns the status before the snapshot was applied.
    pub fn apply(&mut self, snapshot: IdentitySnapshot) -> AuthStatus {
        let previous = self.status;
        match snapshot {
            IdentitySnapshot::SignedOut => {
                self.status = AuthStatus::SignedOut;
                self.user = None;
                self.credits = Credits::SIGNED_OUT_DEFAULT;
            }
            IdentitySnapshot::SignedIn(user) => {
                self.status = AuthStatus::SignedIn;
                self.user = Some(user);
                self.credits = Credits::SIGNED_IN_DEFAULT;
            }
        }
        previous
    }

    /// Replace the balance. No validation is performed.
    pub const fn update_credits(&mut self, credits: Credits) {
        self.credits = credits;
    }

    /// True until the first snapshot arrives.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, AuthStatus::Unknown)
    }

    #[must_use]
    pub const fn status(&self) -> AuthStatus {
        self.status
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn credits(&self) -> Credits {
        self.credits
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.status.is_signed_in()
    }
}
