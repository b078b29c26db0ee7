//! Redis timeline cache.
//!
//! One sorted set per timeline owner under `timeline:user:<ownerId>`, scored
//! by the entry's epoch-millisecond timestamp and holding the serialised row
//! as the member. Every write refreshes a jittered TTL so hot timelines stay
//! resident while idle ones age out, without a synchronised expiry wave.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::bb8::Pool;
use bb8_redis::{RedisConnectionManager, redis};
use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::domain::TimelineEntry;
use crate::domain::ports::{CacheError, TimelineCache};

use super::memory::DEFAULT_CACHE_TTL;

/// Maximum random extension added to the TTL, in seconds.
const TTL_JITTER_SECS: u64 = 60;

/// Cache key for one owner's timeline sorted set.
fn timeline_key(owner_id: Uuid) -> String {
    format!("timeline:user:{owner_id}")
}

/// Redis-backed [`TimelineCache`] over a `bb8` connection pool.
pub struct RedisTimelineCache {
    pool: Pool<RedisConnectionManager>,
    ttl: Duration,
}

impl RedisTimelineCache {
    /// Connect to `url` with the default TTL.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        Self::connect_with_ttl(url, DEFAULT_CACHE_TTL).await
    }

    /// Connect to `url`, caching timelines for `ttl` after their last write.
    pub async fn connect_with_ttl(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(url)
            .map_err(|error| CacheError::backend(error.to_string()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|error| CacheError::backend(error.to_string()))?;
        Ok(Self { pool, ttl })
    }

    fn ttl_with_jitter(&self) -> u64 {
        let mut rng = SmallRng::from_entropy();
        self.ttl.as_secs() + rng.gen_range(0..=TTL_JITTER_SECS)
    }

    async fn write_entries(
        &self,
        owner_id: Uuid,
        entries: &[TimelineEntry],
    ) -> Result<(), CacheError> {
        let key = timeline_key(owner_id);
        let mut pipe = redis::pipe();
        for entry in entries {
            let member = serde_json::to_string(entry)
                .map_err(|error| CacheError::serialization(error.to_string()))?;
            pipe.cmd("ZADD")
                .arg(&key)
                .arg(entry.created_at.timestamp_millis())
                .arg(member)
                .ignore();
        }
        pipe.cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_with_jitter())
            .ignore();

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| CacheError::backend(error.to_string()))?;
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|error| CacheError::backend(error.to_string()))
    }
}

#[async_trait]
impl TimelineCache for RedisTimelineCache {
    async fn page(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, CacheError> {
        // Cursor is exclusive, hence the open-interval score bound.
        let max_score = before.map_or_else(
            || "+inf".to_owned(),
            |cursor| format!("({}", cursor.timestamp_millis()),
        );

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| CacheError::backend(error.to_string()))?;
        let members: Vec<String> = redis::cmd("ZREVRANGEBYSCORE")
            .arg(timeline_key(owner_id))
            .arg(max_score)
            .arg("-inf")
            .arg("LIMIT")
            .arg(0)
            .arg(limit as u64)
            .query_async(&mut *conn)
            .await
            .map_err(|error| CacheError::backend(error.to_string()))?;

        members
            .iter()
            .map(|member| {
                serde_json::from_str(member)
                    .map_err(|error| CacheError::serialization(error.to_string()))
            })
            .collect()
    }

    async fn put(&self, owner_id: Uuid, entry: &TimelineEntry) -> Result<(), CacheError> {
        self.write_entries(owner_id, std::slice::from_ref(entry))
            .await
    }

    async fn fill(&self, owner_id: Uuid, entries: &[TimelineEntry]) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.write_entries(owner_id, entries).await
    }

    async fn invalidate(&self, owner_id: Uuid) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| CacheError::backend(error.to_string()))?;
        redis::cmd("DEL")
            .arg(timeline_key(owner_id))
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|error| CacheError::backend(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_the_wire_contract() {
        let owner = Uuid::nil();
        assert_eq!(
            timeline_key(owner),
            "timeline:user:00000000-0000-0000-0000-000000000000"
        );
    }
}
