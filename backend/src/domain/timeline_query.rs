//! Materialised timeline reads through the cache.
//!
//! The fan-out-on-write read path: one partition read per request. The cache
//! answers when warm; a cold or expired key falls back to the timeline store,
//! returns immediately, and schedules a detached refill so the next request
//! hits the cache. Callers are never blocked on cache population.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pagination::CursorPage;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::DomainResult;
use super::ports::{TimelineCache, TimelineStore};
use super::timeline::TimelineEntry;

/// Serves home timelines from cache with storage fallback.
pub struct TimelineQueryService {
    cache: Arc<dyn TimelineCache>,
    timelines: Arc<dyn TimelineStore>,
}

impl TimelineQueryService {
    /// Wire the service against the cache and the timeline store.
    pub fn new(cache: Arc<dyn TimelineCache>, timelines: Arc<dyn TimelineStore>) -> Self {
        Self { cache, timelines }
    }

    /// One page of `owner_id`'s home timeline, newest first.
    ///
    /// An empty cache result is indistinguishable from "no matching rows",
    /// so emptiness always triggers the storage read; a genuinely empty
    /// timeline just reads an empty page twice, which is cheap.
    pub async fn home_timeline(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        page_size: usize,
    ) -> DomainResult<CursorPage<TimelineEntry>> {
        match self.cache.page(owner_id, before, page_size).await {
            Ok(cached) if !cached.is_empty() => {
                debug!(owner_id = %owner_id, rows = cached.len(), "timeline served from cache");
                return Ok(CursorPage::from_newest_first(cached, page_size));
            }
            Ok(_) => debug!(owner_id = %owner_id, "timeline cache miss"),
            Err(error) => {
                warn!(owner_id = %owner_id, %error, "timeline cache read failed, falling back");
            }
        }

        let rows = self
            .timelines
            .recent_for_owner(owner_id, before, page_size)
            .await?;

        self.schedule_refill(owner_id, rows.clone());

        Ok(CursorPage::from_newest_first(rows, page_size))
    }

    /// Refill the cache off the request path; the response has already been
    /// computed from storage by the time this runs.
    fn schedule_refill(&self, owner_id: Uuid, rows: Vec<TimelineEntry>) {
        if rows.is_empty() {
            return;
        }
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(error) = cache.fill(owner_id, &rows).await {
                warn!(owner_id = %owner_id, %error, "async cache refill failed");
            }
        });
    }
}
