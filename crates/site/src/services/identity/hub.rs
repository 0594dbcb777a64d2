//! Per-visitor identity notification channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dpicon_core::{IdentitySnapshot, VisitorId};
use moka::sync::Cache;
use tokio::sync::watch;

type Channel = Arc<watch::Sender<IdentitySnapshot>>;

/// Latest identity snapshot per visitor, fanned out to subscribers.
///
/// Each visitor gets one `watch` channel. Publishing replaces the stored
/// snapshot even when nobody is subscribed, so a context created later
/// starts from the provider's current view. Channels idle out together with
/// the sessions that use them, and at most `max_channels` are kept.
#[derive(Clone)]
pub struct IdentityHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    channels: Cache<VisitorId, Channel>,
    active: AtomicUsize,
}

impl IdentityHub {
    #[must_use]
    pub fn new(idle_timeout: Duration, max_channels: u64) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: Cache::builder()
                    .max_capacity(max_channels)
                    .time_to_idle(idle_timeout)
                    .build(),
                active: AtomicUsize::new(0),
            }),
        }
    }

    fn channel(&self, visitor: &VisitorId) -> Channel {
        self.inner.channels.get_with(visitor.clone(), || {
            Arc::new(watch::channel(IdentitySnapshot::SignedOut).0)
        })
    }

    /// Replace the visitor's snapshot and wake their subscribers.
    pub fn publish(&self, visitor: &VisitorId, snapshot: IdentitySnapshot) {
        self.channel(visitor).send_replace(snapshot);
    }

    /// The snapshot subscribers would see next.
    #[must_use]
    pub fn current(&self, visitor: &VisitorId) -> IdentitySnapshot {
        self.channel(visitor).borrow().clone()
    }

    /// Subscribe to a visitor's snapshots.
    ///
    /// The current snapshot counts as unseen, so the first
    /// [`IdentitySubscription::pending`] call always yields it.
    #[must_use]
    pub fn subscribe(&self, visitor: &VisitorId) -> IdentitySubscription {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(visitor = %visitor, "identity subscription opened");
        IdentitySubscription {
            hub: self.clone(),
            visitor: visitor.clone(),
            receiver: self.receiver(visitor),
        }
    }

    fn receiver(&self, visitor: &VisitorId) -> watch::Receiver<IdentitySnapshot> {
        let mut receiver = self.channel(visitor).subscribe();
        receiver.mark_changed();
        receiver
    }

    /// Number of subscriptions that have not been released yet.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }
}

/// A live subscription to one visitor's identity snapshots.
///
/// Released when dropped. [`IdentitySubscription::unsubscribe`] consumes the
/// guard, so a subscription can only ever be released once.
pub struct IdentitySubscription {
    hub: IdentityHub,
    visitor: VisitorId,
    receiver: watch::Receiver<IdentitySnapshot>,
}

impl IdentitySubscription {
    /// The latest snapshot if it has not been seen yet.
    ///
    /// Snapshots are complete, so intermediate ones that were overwritten
    /// before this call carry no information the latest one lacks.
    pub fn pending(&mut self) -> Option<IdentitySnapshot> {
        match self.receiver.has_changed() {
            Ok(true) => Some(self.receiver.borrow_and_update().clone()),
            Ok(false) => {
                // keeps the channel from idling out while the visitor is active
                self.hub.inner.channels.get(&self.visitor);
                None
            }
            Err(_) => {
                // channel idled out of the hub; attach to its replacement
                self.receiver = self.hub.receiver(&self.visitor);
                Some(self.receiver.borrow_and_update().clone())
            }
        }
    }

    #[must_use]
    pub const fn visitor(&self) -> &VisitorId {
        &self.visitor
    }

    /// Release the subscription now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.hub.inner.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(visitor = %self.visitor, "identity subscription released");
    }
}

impl std::fmt::Debug for IdentitySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySubscription")
            .field("visitor", &self.visitor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpicon_core::{SubjectId, UserIdentity};

    fn hub() -> IdentityHub {
        IdentityHub::new(Duration::from_secs(60), 100)
    }

    fn signed_in(name: &str) -> IdentitySnapshot {
        IdentitySnapshot::SignedIn(UserIdentity {
            subject: SubjectId::new(name),
            display_name: Some(name.to_owned()),
            email: None,
            avatar_url: None,
        })
    }

    #[test]
    fn test_first_pending_is_current_snapshot() {
        let hub = hub();
        let visitor = VisitorId::new("v1");
        let mut sub = hub.subscribe(&visitor);
        assert_eq!(sub.pending(), Some(IdentitySnapshot::SignedOut));
        assert_eq!(sub.pending(), None);
    }

    #[test]
    fn test_publish_before_subscribe_is_retained() {
        let hub = hub();
        let visitor = VisitorId::new("v1");
        hub.publish(&visitor, signed_in("Ada"));
        let mut sub = hub.subscribe(&visitor);
        assert_eq!(sub.pending(), Some(signed_in("Ada")));
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let hub = hub();
        let visitor = VisitorId::new("v1");
        let mut sub = hub.subscribe(&visitor);
        let _ = sub.pending();
        hub.publish(&visitor, signed_in("Ada"));
        hub.publish(&visitor, IdentitySnapshot::SignedOut);
        assert_eq!(sub.pending(), Some(IdentitySnapshot::SignedOut));
        assert_eq!(sub.pending(), None);
    }

    #[test]
    fn test_visitors_are_isolated() {
        let hub = hub();
        let a = VisitorId::new("a");
        let b = VisitorId::new("b");
        let mut sub_b = hub.subscribe(&b);
        let _ = sub_b.pending();
        hub.publish(&a, signed_in("Ada"));
        assert_eq!(sub_b.pending(), None);
    }

    #[test]
    fn test_channel_count_is_bounded() {
        let hub = IdentityHub::new(Duration::from_secs(60), 8);
        for n in 0..200 {
            hub.publish(&VisitorId::new(format!("v{n}")), IdentitySnapshot::SignedOut);
        }
        hub.inner.channels.run_pending_tasks();
        assert!(hub.inner.channels.entry_count() <= 8);
    }

    #[test]
    fn test_release_exactly_once() {
        let hub = hub();
        let visitor = VisitorId::new("v1");
        let first = hub.subscribe(&visitor);
        let second = hub.subscribe(&visitor);
        assert_eq!(hub.active_subscriptions(), 2);
        first.unsubscribe();
        assert_eq!(hub.active_subscriptions(), 1);
        drop(second);
        assert_eq!(hub.active_subscriptions(), 0);
    }
}
