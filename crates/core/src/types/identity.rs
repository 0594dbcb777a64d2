//! Identities reported by the external identity provider.

use serde::{Deserialize, Serialize};

use super::{Email, SubjectId};

/// Name used in the greeting when the provider gave us nothing usable.
pub const FALLBACK_FIRST_NAME: &str = "User";

/// Profile of a signed-in user.
///
/// Everything except the subject is optional on the provider's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub subject: SubjectId,
    pub display_name: Option<String>,
    pub email: Option<Email>,
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    /// First whitespace-separated token of the display name, or `"User"`.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or(FALLBACK_FIRST_NAME)
    }

    /// Name for the avatar's alt text: the full display name or `"User"`.
    #[must_use]
    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FIRST_NAME)
    }
}

/// One identity-change notification from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum IdentitySnapshot {
    SignedOut,
    SignedIn(UserIdentity),
}

impl IdentitySnapshot {
    #[must_use]
    pub const fn user(&self) -> Option<&UserIdentity> {
        match self {
            Self::SignedOut => None,
            Self::SignedIn(user) => Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> UserIdentity {
        UserIdentity {
            subject: SubjectId::new("sub-1"),
            display_name: name.map(str::to_owned),
            email: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_first_name() {
        assert_eq!(user(Some("Ada Lovelace")).first_name(), "Ada");
        assert_eq!(user(Some("  Grace   Hopper ")).first_name(), "Grace");
        assert_eq!(user(Some("Plato")).first_name(), "Plato");
    }

    #[test]
    fn test_first_name_falls_back() {
        assert_eq!(user(None).first_name(), "User");
        assert_eq!(user(Some("")).first_name(), "User");
        assert_eq!(user(Some("   ")).first_name(), "User");
    }

    #[test]
    fn test_snapshot_user() {
        assert!(IdentitySnapshot::SignedOut.user().is_none());
        let snapshot = IdentitySnapshot::SignedIn(user(Some("Ada")));
        assert_eq!(snapshot.user().map(UserIdentity::first_name), Some("Ada"));
    }
}
