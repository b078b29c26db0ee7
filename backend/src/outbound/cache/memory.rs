//! Process-local timeline cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::TimelineEntry;
use crate::domain::ports::{CacheError, TimelineCache};

/// Default lifetime of a cached timeline. Timelines mutate frequently and
/// tolerate only shallow staleness, so the window is short.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

struct Slot {
    expires_at: Instant,
    rows: BTreeMap<(DateTime<Utc>, Uuid), TimelineEntry>,
}

/// In-memory per-owner sorted cache with TTL semantics matching the Redis
/// adapter: any write refreshes the whole slot's lifetime, reads of an
/// expired slot behave like a cold key.
pub struct InMemoryTimelineCache {
    ttl: Duration,
    slots: RwLock<HashMap<Uuid, Slot>>,
}

impl InMemoryTimelineCache {
    /// Build a cache whose slots live for `ttl` after their last write.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn write_rows(&self, owner_id: Uuid, entries: &[TimelineEntry]) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(owner_id).or_insert_with(|| Slot {
            expires_at: Instant::now() + self.ttl,
            rows: BTreeMap::new(),
        });
        slot.expires_at = Instant::now() + self.ttl;
        for entry in entries {
            slot.rows.insert(entry.sort_key(), entry.clone());
        }
    }
}

impl Default for InMemoryTimelineCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }
}

#[async_trait]
impl TimelineCache for InMemoryTimelineCache {
    async fn page(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, CacheError> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get(&owner_id) else {
            return Ok(Vec::new());
        };
        if slot.expires_at <= Instant::now() {
            return Ok(Vec::new());
        }
        Ok(slot
            .rows
            .iter()
            .rev()
            .filter(|((created_at, _), _)| before.is_none_or(|cursor| *created_at < cursor))
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn put(&self, owner_id: Uuid, entry: &TimelineEntry) -> Result<(), CacheError> {
        self.write_rows(owner_id, std::slice::from_ref(entry));
        Ok(())
    }

    async fn fill(&self, owner_id: Uuid, entries: &[TimelineEntry]) -> Result<(), CacheError> {
        self.write_rows(owner_id, entries);
        Ok(())
    }

    async fn invalidate(&self, owner_id: Uuid) -> Result<(), CacheError> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&owner_id);
        Ok(())
    }
}
