//! Session middleware configuration.
//!
//! The cookie session only carries the visitor key and sign-in handshake
//! values, so records live in memory. Sessions do not survive a restart;
//! neither does the visitor state they point at.
//!
//! Records are held in a bounded moka cache and dropped when their expiry
//! date passes, so abandoned sessions do not accumulate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tower_sessions::cookie::time::{self, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry as SessionExpiry, SessionManagerLayer};

use crate::config::SiteConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "dpicon_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Keeps each record until its own expiry date.
struct RecordExpiry;

fn until(expiry_date: OffsetDateTime) -> Duration {
    Duration::try_from(expiry_date - OffsetDateTime::now_utc()).unwrap_or(Duration::ZERO)
}

impl Expiry<Id, Record> for RecordExpiry {
    fn expire_after_create(&self, _id: &Id, record: &Record, _created_at: Instant) -> Option<Duration> {
        Some(until(record.expiry_date))
    }

    fn expire_after_update(
        &self,
        _id: &Id,
        record: &Record,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(until(record.expiry_date))
    }
}

/// In-memory session store holding at most `max_records` sessions.
#[derive(Debug, Clone)]
pub struct BoundedMemoryStore {
    records: Cache<Id, Record>,
}

impl BoundedMemoryStore {
    #[must_use]
    pub fn new(max_records: u64) -> Self {
        Self {
            records: Cache::builder()
                .max_capacity(max_records)
                .expire_after(RecordExpiry)
                .build(),
        }
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> u64 {
        self.records.run_pending_tasks().await;
        self.records.entry_count()
    }
}

#[async_trait]
impl SessionStore for BoundedMemoryStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.records.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records
            .get(session_id)
            .await
            .filter(|record| record.expiry_date > now))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.invalidate(session_id).await;
        Ok(())
    }
}

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer(
    config: &SiteConfig,
    store: BoundedMemoryStore,
) -> SessionManagerLayer<BoundedMemoryStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(SessionExpiry::OnInactivity(time::Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
