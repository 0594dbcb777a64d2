//! Site configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SITE_BASE_URL` - Public URL for the site (OAuth redirects are built from it)
//! - `GOOGLE_CLIENT_ID` - Google OAuth client ID
//! - `GOOGLE_CLIENT_SECRET` - Google OAuth client secret (high entropy)
//! - `RAZORPAY_KEY_ID` - Razorpay publishable key id
//!
//! ## Optional
//! - `SITE_HOST` - Bind address (default: 127.0.0.1)
//! - `SITE_PORT` - Listen port (default: 3000)
//! - `SITE_CONTENT_DIR` - Markdown content root (default: crates/site/content)
//! - `SITE_STATIC_DIR` - Static asset root (default: crates/site/static)
//! - `RAZORPAY_CHECKOUT_SCRIPT_URL` - Checkout widget script
//! - `CHECKOUT_MERCHANT_NAME` - Merchant name shown in the widget (default: DPIcon)
//! - `CHECKOUT_THEME_COLOR` - Widget accent colour (default: #9333ea)
//! - `FACE_FUSION_GENERATION_DELAY_MS` - Simulated generation time (default: 3000)
//! - `FACE_FUSION_FEEDBACK_CLEAR_MS` - Validation feedback lifetime (default: 3000)
//! - `FACE_FUSION_MAX_UPLOAD_BYTES` - Upload size limit (default: 10 MiB)
//! - `SESSION_MAX_VISITORS` - Visitors kept in memory at once (default: 10000)
//! - `SESSION_ANONYMOUS_IDLE_SECS` - Idle lifetime of a signed-out visitor (default: 1800)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default Razorpay checkout script.
pub const DEFAULT_CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Site application configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without a trailing slash
    pub base_url: String,
    /// Root of the markdown content tree
    pub content_dir: PathBuf,
    /// Root of the static asset tree
    pub static_dir: PathBuf,
    pub google: GoogleConfig,
    pub checkout: CheckoutConfig,
    pub face_fusion: FaceFusionConfig,
    pub sessions: SessionConfig,
    pub sentry: SentryConfig,
}

/// Google OAuth client configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Payment widget configuration.
///
/// The key id is publishable (it is sent to the browser), so nothing here
/// is secret.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub key_id: String,
    pub script_url: String,
    pub merchant_name: String,
    pub theme_color: String,
}

/// Timings and limits for the Face Fusion generator.
#[derive(Debug, Clone, Copy)]
pub struct FaceFusionConfig {
    pub generation_delay: Duration,
    pub feedback_clear: Duration,
    pub max_upload_bytes: usize,
}

impl Default for FaceFusionConfig {
    fn default() -> Self {
        Self {
            generation_delay: Duration::from_millis(3000),
            feedback_clear: Duration::from_millis(3000),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Bounds on in-memory visitor state.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Visitors kept at once; past this the least used are evicted
    pub max_visitors: u64,
    /// Idle lifetime of a visitor who has signed in
    pub idle_timeout: Duration,
    /// Idle lifetime of a visitor who has not
    pub anonymous_idle_timeout: Duration,
}

/// Signed-in visitors last as long as the session cookie (7 days).
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl SiteConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SiteConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let host = env.parsed_or("SITE_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parsed_or("SITE_PORT", 3000_u16)?;
        let base_url = env.required("SITE_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SITE_BASE_URL".to_string(), e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            host,
            port,
            base_url,
            content_dir: env.or("SITE_CONTENT_DIR", "crates/site/content").into(),
            static_dir: env.or("SITE_STATIC_DIR", "crates/site/static").into(),
            google: GoogleConfig {
                client_id: env.required("GOOGLE_CLIENT_ID")?,
                client_secret: env.validated_secret("GOOGLE_CLIENT_SECRET")?,
            },
            checkout: CheckoutConfig {
                key_id: env.required("RAZORPAY_KEY_ID")?,
                script_url: env.or("RAZORPAY_CHECKOUT_SCRIPT_URL", DEFAULT_CHECKOUT_SCRIPT_URL),
                merchant_name: env.or("CHECKOUT_MERCHANT_NAME", "DPIcon"),
                theme_color: env.or("CHECKOUT_THEME_COLOR", "#9333ea"),
            },
            face_fusion: FaceFusionConfig {
                generation_delay: Duration::from_millis(
                    env.parsed_or("FACE_FUSION_GENERATION_DELAY_MS", 3000_u64)?,
                ),
                feedback_clear: Duration::from_millis(
                    env.parsed_or("FACE_FUSION_FEEDBACK_CLEAR_MS", 3000_u64)?,
                ),
                max_upload_bytes: env
                    .parsed_or("FACE_FUSION_MAX_UPLOAD_BYTES", 10 * 1024 * 1024_usize)?,
            },
            sessions: SessionConfig {
                max_visitors: env.parsed_or("SESSION_MAX_VISITORS", 10_000_u64)?,
                idle_timeout: SESSION_IDLE_TIMEOUT,
                anonymous_idle_timeout: Duration::from_secs(
                    env.parsed_or("SESSION_ANONYMOUS_IDLE_SECS", 30 * 60_u64)?,
                ),
            },
            sentry: SentryConfig {
                dsn: env.optional("SENTRY_DSN"),
                environment: env.optional("SENTRY_ENVIRONMENT"),
                sample_rate: env.parsed_or("SENTRY_SAMPLE_RATE", 1.0_f32)?,
                traces_sample_rate: env.parsed_or("SENTRY_TRACES_SAMPLE_RATE", 0.0_f32)?,
            },
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a site path.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS
        .iter()
        .find(|pattern| lower.contains(*pattern))
    {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value issued by the provider."
            ),
        ));
    }

    Ok(())
}
