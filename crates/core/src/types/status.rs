//! Status enums for session and generation state.

use serde::{Deserialize, Serialize};

/// Authentication status of a visitor, as last reported by the identity
/// provider.
///
/// `Unknown` only exists between session creation and the first identity
/// snapshot; once left, it is never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    Unknown,
    SignedOut,
    SignedIn,
}

impl AuthStatus {
    #[must_use]
    pub const fn is_signed_in(self) -> bool {
        matches!(self, Self::SignedIn)
    }
}

/// Where a Face Fusion generation request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    /// Nothing running.
    #[default]
    Idle,
    /// Inputs were valid but the visitor must sign in first.
    AwaitingSignIn,
    /// A (simulated) generation is running.
    InFlight,
}

impl GenerationPhase {
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::InFlight)
    }
}
