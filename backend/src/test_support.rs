//! Shared test doubles for the fan-out engine tests.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::domain::TimelineEntry;
use crate::domain::ports::{StoreError, TimelineStore};
use crate::outbound::memory::InMemoryTimelineStore;

/// Clock pinned to a single instant.
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Timeline store whose batch writes fail a configured number of times
/// before delegating to a real in-memory store.
pub struct FlakyTimelineStore {
    inner: InMemoryTimelineStore,
    failures_remaining: AtomicU32,
}

impl FlakyTimelineStore {
    /// Fail the first `failures` batch writes, then succeed.
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: InMemoryTimelineStore::default(),
            failures_remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl TimelineStore for FlakyTimelineStore {
    async fn upsert_batch(&self, entries: &[TimelineEntry]) -> Result<(), StoreError> {
        let remaining = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(StoreError::timeout("injected batch failure"));
        }
        self.inner.upsert_batch(entries).await
    }

    async fn recent_for_owner(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, StoreError> {
        self.inner.recent_for_owner(owner_id, before, limit).await
    }

    async fn remove_author_entries(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> Result<usize, StoreError> {
        self.inner.remove_author_entries(owner_id, author_id).await
    }
}
