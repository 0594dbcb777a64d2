//! Google sign-in over OAuth 2.0 / `OpenID` Connect.
//!
//! # OAuth Flow
//!
//! 1. Generate authorization URL with `authorization_url()`
//! 2. Redirect the visitor to Google's consent screen
//! 3. Google redirects back with an authorization code
//! 4. `complete_sign_in()` exchanges the code, checks the ID token's nonce,
//!    fetches the profile and publishes `SignedIn` for the visitor
//!
//! The ID token comes straight from the token endpoint over TLS, so only its
//! `nonce` claim is read; the signature is not checked.
//!
//! The access token is kept in memory only so `sign_out()` can revoke it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use dpicon_core::{Email, IdentitySnapshot, SubjectId, UserIdentity, VisitorId};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{IdentityError, IdentityHub, IdentityProvider, IdentitySubscription};
use crate::config::{GoogleConfig, SessionConfig};

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const REVOCATION_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    nonce: Option<String>,
}

/// Check that `id_token` was issued for the sign-in attempt that sent `expected`.
fn verify_nonce(id_token: &str, expected: &str) -> Result<(), IdentityError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| IdentityError::IdToken("missing payload".to_owned()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| IdentityError::IdToken(e.to_string()))?;
    let claims: IdTokenClaims =
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::IdToken(e.to_string()))?;

    if claims.nonce.as_deref() == Some(expected) {
        Ok(())
    } else {
        Err(IdentityError::NonceMismatch)
    }
}

/// Claims returned by the userinfo endpoint.
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl UserInfo {
    fn into_identity(self) -> UserIdentity {
        let email = self.email.as_deref().and_then(|raw| match Email::parse(raw) {
            Ok(email) => Some(email),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed email from userinfo");
                None
            }
        });

        UserIdentity {
            subject: SubjectId::new(self.sub),
            display_name: self.name.filter(|name| !name.trim().is_empty()),
            email,
            avatar_url: self.picture,
        }
    }
}

/// Identity provider backed by Google accounts.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    inner: Arc<GoogleInner>,
}

struct GoogleInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    hub: IdentityHub,
    tokens: Cache<VisitorId, Arc<SecretString>>,
}

impl GoogleIdentityProvider {
    /// Create a provider that publishes into `hub`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &GoogleConfig,
        hub: IdentityHub,
        limits: &SessionConfig,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(GoogleInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                hub,
                tokens: Cache::builder()
                    .max_capacity(limits.max_visitors)
                    .time_to_idle(limits.idle_timeout)
                    .build(),
            }),
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, IdentityError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .inner
            .client
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(IdentityError::TokenExchange(format!("{status}: {text}")));
        }

        Ok(response.json().await?)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<UserIdentity, IdentityError> {
        let response = self
            .inner
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::UserInfo(response.status().to_string()));
        }

        let info: UserInfo = response.json().await?;
        Ok(info.into_identity())
    }

    async fn revoke(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .inner
            .client
            .post(REVOCATION_ENDPOINT)
            .form(&[("token", access_token)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(IdentityError::Revocation(response.status().to_string()))
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        Url::parse_with_params(
            AUTHORIZATION_ENDPOINT,
            &[
                ("client_id", self.inner.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("scope", "openid email profile"),
                ("state", state),
                ("nonce", nonce),
                ("prompt", "select_account"),
            ],
        )
        .map_or_else(|_| AUTHORIZATION_ENDPOINT.to_string(), String::from)
    }

    async fn complete_sign_in(
        &self,
        visitor: &VisitorId,
        code: &str,
        redirect_uri: &str,
        nonce: &str,
    ) -> Result<UserIdentity, IdentityError> {
        let TokenResponse {
            access_token,
            id_token,
        } = self.exchange_code(code, redirect_uri).await?;
        verify_nonce(&id_token, nonce)?;
        let user = self.fetch_user(&access_token).await?;

        self.inner
            .tokens
            .insert(visitor.clone(), Arc::new(SecretString::from(access_token)))
            .await;
        self.inner
            .hub
            .publish(visitor, IdentitySnapshot::SignedIn(user.clone()));

        Ok(user)
    }

    async fn sign_out(&self, visitor: &VisitorId) -> Result<(), IdentityError> {
        let token = self.inner.tokens.remove(visitor).await;
        self.inner.hub.publish(visitor, IdentitySnapshot::SignedOut);

        match token {
            Some(token) => self.revoke(token.expose_secret()).await,
            None => Ok(()),
        }
    }

    fn subscribe(&self, visitor: &VisitorId) -> IdentitySubscription {
        self.inner.hub.subscribe(visitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn provider() -> GoogleIdentityProvider {
        let config = GoogleConfig {
            client_id: "1234.apps.googleusercontent.com".to_string(),
            client_secret: SecretString::from("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"),
        };
        let limits = SessionConfig {
            max_visitors: 100,
            idle_timeout: Duration::from_secs(60),
            anonymous_idle_timeout: Duration::from_secs(10),
        };
        GoogleIdentityProvider::new(&config, IdentityHub::new(limits.idle_timeout, 100), &limits).unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let url = provider().authorization_url(
            "http://localhost:3000/auth/google/callback",
            "state123",
            "nonce456",
        );
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));

        let query: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("1234.apps.googleusercontent.com"));
        assert_eq!(
            get("redirect_uri"),
            Some("http://localhost:3000/auth/google/callback")
        );
        assert_eq!(get("scope"), Some("openid email profile"));
        assert_eq!(get("state"), Some("state123"));
        assert_eq!(get("nonce"), Some("nonce456"));
    }

    fn id_token(claims: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[test]
    fn test_verify_nonce() {
        let token = id_token(r#"{"sub":"1","nonce":"nonce456"}"#);
        assert!(verify_nonce(&token, "nonce456").is_ok());
        assert!(matches!(
            verify_nonce(&token, "other"),
            Err(IdentityError::NonceMismatch)
        ));
        assert!(matches!(
            verify_nonce(&id_token(r#"{"sub":"1"}"#), "nonce456"),
            Err(IdentityError::NonceMismatch)
        ));
        assert!(matches!(
            verify_nonce("not-a-jwt", "nonce456"),
            Err(IdentityError::IdToken(_))
        ));
    }

    #[test]
    fn test_userinfo_into_identity() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"10769150350006150715113082367","name":"Ada Lovelace","email":"Ada@Example.com","picture":"https://lh3.googleusercontent.com/a/abc"}"#,
        )
        .unwrap();
        let user = info.into_identity();
        assert_eq!(user.subject.as_str(), "10769150350006150715113082367");
        assert_eq!(user.first_name(), "Ada");
        assert_eq!(user.email.as_ref().map(Email::as_str), Some("ada@example.com"));
        assert!(user.avatar_url.is_some());
    }

    #[test]
    fn test_userinfo_with_missing_profile_fields() {
        let info: UserInfo = serde_json::from_str(r#"{"sub":"1","name":"  ","email":"nope"}"#).unwrap();
        let user = info.into_identity();
        assert!(user.display_name.is_none());
        assert!(user.email.is_none());
        assert_eq!(user.first_name(), "User");
    }

    #[tokio::test]
    async fn test_sign_out_without_token_publishes_signed_out() {
        let provider = provider();
        let visitor = VisitorId::new("v1");
        provider.inner.hub.publish(
            &visitor,
            IdentitySnapshot::SignedIn(UserIdentity {
                subject: SubjectId::new("1"),
                display_name: None,
                email: None,
                avatar_url: None,
            }),
        );

        provider.sign_out(&visitor).await.unwrap();
        assert_eq!(provider.inner.hub.current(&visitor), IdentitySnapshot::SignedOut);
    }
}
