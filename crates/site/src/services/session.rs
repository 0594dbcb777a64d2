//! Per-visitor session contexts.
//!
//! A [`SessionContext`] is created the first time a visitor is seen and owns
//! everything that visitor can change: identity and credits, the generator
//! inputs, the plan selector and an open checkout. It subscribes to the
//! identity provider on creation and releases the subscription when it is
//! dropped, which happens when the [`SessionRegistry`] evicts it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dpicon_core::{AuthStatus, Credits, IdentitySnapshot, SessionState, VisitorId};
use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::SessionConfig;
use crate::models::Notification;
use crate::services::checkout::PendingCheckout;
use crate::services::generation::GenerationState;
use crate::services::identity::{IdentityProvider, IdentitySubscription};

/// Toasts waiting to be shown, oldest first.
#[derive(Debug, Default)]
pub struct Notifications(VecDeque<Notification>);

impl Notifications {
    pub fn push(&mut self, notification: Notification) {
        self.0.push_back(notification);
    }

    /// Take every queued toast.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.0.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mutable state of one visitor. Obtained through [`SessionContext::lock`],
/// which applies pending identity snapshots first.
#[derive(Debug)]
pub struct VisitorState {
    subscription: IdentitySubscription,
    session: SessionState,
    plans_open: bool,
    pub(crate) generation: GenerationState,
    pub(crate) checkout: Option<PendingCheckout>,
    pub(crate) notifications: Notifications,
}

impl VisitorState {
    fn new(subscription: IdentitySubscription) -> Self {
        Self {
            subscription,
            session: SessionState::new(),
            plans_open: false,
            generation: GenerationState::default(),
            checkout: None,
            notifications: Notifications::default(),
        }
    }

    /// Apply every snapshot the provider published since the last sync.
    fn sync(&mut self) {
        while let Some(snapshot) = self.subscription.pending() {
            let previous = self.session.apply(snapshot);
            tracing::info!(
                visitor = %self.subscription.visitor(),
                from = ?previous,
                to = ?self.session.status(),
                credits = self.session.credits().get(),
                "identity snapshot applied"
            );
        }
    }

    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    /// Overwrite the credit balance.
    pub fn update_credits(&mut self, credits: Credits) {
        tracing::info!(
            visitor = %self.subscription.visitor(),
            from = self.session.credits().get(),
            to = credits.get(),
            "credits updated"
        );
        self.session.update_credits(credits);
    }

    #[must_use]
    pub const fn plans_open(&self) -> bool {
        self.plans_open
    }

    pub const fn open_plans(&mut self) {
        self.plans_open = true;
    }

    pub const fn close_plans(&mut self) {
        self.plans_open = false;
    }

    /// Read-only view for the page header.
    #[must_use]
    pub fn header(&self) -> HeaderView {
        HeaderView::new(&self.session, self.plans_open)
    }
}

/// What the header shows about the visitor. Also served as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderView {
    pub status: AuthStatus,
    pub loading: bool,
    pub signed_in: bool,
    pub first_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub credits: i64,
    pub credits_display: String,
    pub plans_open: bool,
}

impl HeaderView {
    fn new(session: &SessionState, plans_open: bool) -> Self {
        let user = session.user();
        Self {
            status: session.status(),
            loading: session.is_loading(),
            signed_in: session.is_signed_in(),
            first_name: user.map(|u| u.first_name().to_owned()),
            display_name: user.map(|u| u.display_name_or_default().to_owned()),
            email: user.and_then(|u| u.email.as_ref().map(|e| e.as_str().to_owned())),
            avatar_url: user.and_then(|u| u.avatar_url.clone()),
            credits: session.credits().get(),
            credits_display: session.credits().grouped(),
            plans_open,
        }
    }

    /// What a visitor without a context sees: signed out with the starter
    /// balance.
    #[must_use]
    pub fn signed_out() -> Self {
        let mut session = SessionState::new();
        session.apply(IdentitySnapshot::SignedOut);
        Self::new(&session, false)
    }
}

/// Explicitly constructed session scope for one visitor.
#[derive(Debug)]
pub struct SessionContext {
    visitor: VisitorId,
    signed_in: AtomicBool,
    state: Mutex<VisitorState>,
}

impl SessionContext {
    /// Create a context that owns `subscription` for its whole lifetime.
    #[must_use]
    pub fn new(visitor: VisitorId, subscription: IdentitySubscription) -> Self {
        Self {
            visitor,
            signed_in: AtomicBool::new(false),
            state: Mutex::new(VisitorState::new(subscription)),
        }
    }

    #[must_use]
    pub const fn visitor(&self) -> &VisitorId {
        &self.visitor
    }

    /// Whether the visitor was signed in as of the last lock.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::Relaxed)
    }

    /// Lock the visitor's state after applying pending identity snapshots.
    pub async fn lock(&self) -> MutexGuard<'_, VisitorState> {
        let mut state = self.state.lock().await;
        state.sync();
        self.signed_in
            .store(state.session.is_signed_in(), Ordering::Relaxed);
        state
    }

    /// Current header view.
    pub async fn header(&self) -> HeaderView {
        self.lock().await.header()
    }

    /// Current session state.
    pub async fn session(&self) -> SessionState {
        self.lock().await.session().clone()
    }
}

/// Idle lifetime of a context, by whether its visitor has signed in.
struct ContextExpiry {
    signed_in: Duration,
    anonymous: Duration,
}

impl ContextExpiry {
    fn idle_for(&self, context: &SessionContext) -> Duration {
        if context.is_signed_in() {
            self.signed_in
        } else {
            self.anonymous
        }
    }
}

impl Expiry<VisitorId, Arc<SessionContext>> for ContextExpiry {
    fn expire_after_create(
        &self,
        _visitor: &VisitorId,
        context: &Arc<SessionContext>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.idle_for(context))
    }

    fn expire_after_read(
        &self,
        _visitor: &VisitorId,
        context: &Arc<SessionContext>,
        _read_at: Instant,
        _remaining: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(self.idle_for(context))
    }

    fn expire_after_update(
        &self,
        _visitor: &VisitorId,
        context: &Arc<SessionContext>,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.idle_for(context))
    }
}

/// All live visitor contexts.
///
/// At most `max_visitors` contexts are kept. A context idles out after
/// `anonymous_idle_timeout` without a request, or `idle_timeout` once its
/// visitor has signed in. Eviction drops the context, which releases its
/// identity subscription.
#[derive(Clone)]
pub struct SessionRegistry {
    contexts: Cache<VisitorId, Arc<SessionContext>>,
    identity: Arc<dyn IdentityProvider>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, limits: &SessionConfig) -> Self {
        Self {
            contexts: Cache::builder()
                .max_capacity(limits.max_visitors)
                .expire_after(ContextExpiry {
                    signed_in: limits.idle_timeout,
                    anonymous: limits.anonymous_idle_timeout,
                })
                .eviction_listener(|visitor, _, cause| {
                    tracing::debug!(visitor = %visitor, ?cause, "session context evicted");
                })
                .build(),
            identity,
        }
    }


    /// The visitor's context, creating it on first use.
    pub async fn context(&self, visitor: &VisitorId) -> Arc<SessionContext> {
        self.contexts
            .get_with(visitor.clone(), async {
                tracing::debug!(visitor = %visitor, "session context created");
                Arc::new(SessionContext::new(
                    visitor.clone(),
                    self.identity.subscribe(visitor),
                ))
            })
            .await
    }

    /// Drop the visitor's context now.
    pub async fn discard(&self, visitor: &VisitorId) {
        self.contexts.invalidate(visitor).await;
        self.contexts.run_pending_tasks().await;
    }

    /// Number of live contexts.
    pub async fn len(&self) -> u64 {
        self.contexts.run_pending_tasks().await;
        self.contexts.entry_count()
    }
}
