//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::content::{ContentError, ContentStore};
use crate::middleware::session::BoundedMemoryStore;
use crate::services::checkout::{CheckoutBridge, CheckoutError, PaymentGateway, RazorpayGateway};
use crate::services::generation::GenerationWorkflow;
use crate::services::identity::{
    GoogleIdentityProvider, IdentityError, IdentityHub, IdentityProvider,
};
use crate::services::session::SessionRegistry;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),
    #[error("payment gateway: {0}")]
    Checkout(#[from] CheckoutError),
    #[error("content: {0}")]
    Content(#[from] ContentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration, content and the per-visitor services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    content: ContentStore,
    identity: Arc<dyn IdentityProvider>,
    sessions: SessionRegistry,
    session_store: BoundedMemoryStore,
    generation: GenerationWorkflow,
    checkout: CheckoutBridge,
}

impl AppState {
    /// Create the production state: Google sign-in, Razorpay checkout and
    /// markdown pages from `config.content_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the content
    /// directory cannot be read.
    pub fn new(config: SiteConfig) -> Result<Self, StateError> {
        let limits = config.sessions;
        let hub = IdentityHub::new(limits.idle_timeout, limits.max_visitors);
        let identity = GoogleIdentityProvider::new(&config.google, hub, &limits)?;
        let gateway = RazorpayGateway::new(config.checkout.clone())?;
        let content = ContentStore::load(&config.content_dir)?;

        Ok(Self::with_collaborators(
            config,
            content,
            Arc::new(identity),
            Arc::new(gateway),
        ))
    }

    /// Create state around explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: SiteConfig,
        content: ContentStore,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let sessions = SessionRegistry::new(Arc::clone(&identity), &config.sessions);
        let session_store = BoundedMemoryStore::new(config.sessions.max_visitors);
        let generation = GenerationWorkflow::new(&config.face_fusion);
        let checkout = CheckoutBridge::new(gateway);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                content,
                identity,
                sessions,
                session_store,
                generation,
                checkout,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Cookie session records.
    #[must_use]
    pub fn session_store(&self) -> &BoundedMemoryStore {
        &self.inner.session_store
    }

    #[must_use]
    pub fn generation(&self) -> &GenerationWorkflow {
        &self.inner.generation
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutBridge {
        &self.inner.checkout
    }
}
