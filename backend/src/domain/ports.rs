//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the fan-out engines expect to interact with driven
//! adapters (stores, the timeline cache, the retry queue). Each trait exposes
//! strongly typed errors so adapters map their failures into predictable
//! variants instead of returning `anyhow::Result`.
//!
//! Shard selection is the adapter's concern: implementations derive the
//! physical partition from the entity id via [`crate::domain::ShardRouter`]
//! on every call. No port carries ambient "current shard" state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::{FanoutRetryMessage, FollowEdge, Post, TimelineEntry};

/// Errors surfaced by storage adapters.
///
/// Every variant is treated as transient by the fan-out pipeline: batch
/// failures feed the retry queue, per-followee read failures degrade the
/// merge. Only canonical-post writes promote these into a caller-visible
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connectivity to the backing store failed.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
    /// The store did not answer within the adapter's deadline.
    #[error("store timed out: {message}")]
    Timeout { message: String },
    /// A write or query was rejected by the store.
    #[error("store operation failed: {message}")]
    Query { message: String },
}

impl StoreError {
    /// Helper for connectivity failures.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Helper for deadline expiry.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Helper for rejected operations.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the timeline cache adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Cache backend is unavailable or timing out.
    #[error("timeline cache backend failure: {message}")]
    Backend { message: String },
    /// Serialisation or deserialisation of cached rows failed.
    #[error("timeline cache serialisation failed: {message}")]
    Serialization { message: String },
}

impl CacheError {
    /// Helper for backend-level failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Helper for serialisation problems.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the retry queue adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue infrastructure is unavailable.
    #[error("retry queue is unavailable: {message}")]
    Unavailable { message: String },
    /// The message could not be accepted or acknowledged.
    #[error("retry message was rejected: {message}")]
    Rejected { message: String },
}

impl QueueError {
    /// Helper for queue outages.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Helper for rejected messages.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Authoritative post-by-id store.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist the canonical post record.
    async fn insert(&self, post: &Post) -> Result<(), StoreError>;

    /// Fetch a post by identifier.
    async fn find_by_id(&self, post_id: Uuid) -> Result<Option<Post>, StoreError>;
}

/// Posts keyed by author, newest first — the author's own feed.
///
/// Partition key is the author id; rows within a partition sort descending
/// by `(created_at, post_id)`.
#[async_trait]
pub trait AuthorPostsStore: Send + Sync {
    /// Persist the author's denormalised copy of a post.
    async fn insert(&self, post: &Post) -> Result<(), StoreError>;

    /// Newest posts by `author_id` strictly older than `before` (all posts
    /// when `before` is `None`), capped at `limit`.
    async fn recent_by_author(
        &self,
        author_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>, StoreError>;
}

/// Materialised home timelines, partitioned by timeline owner.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Upsert a batch of timeline rows.
    ///
    /// Rows are keyed by `(owner_id, created_at, post_id)`; re-writing an
    /// existing row must be a no-op rather than a duplicate, so fan-out
    /// replays are idempotent.
    async fn upsert_batch(&self, entries: &[TimelineEntry]) -> Result<(), StoreError>;

    /// Newest rows for `owner_id` strictly older than `before` (newest rows
    /// when `before` is `None`), capped at `limit`.
    async fn recent_for_owner(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, StoreError>;

    /// Remove every row in `owner_id`'s timeline authored by `author_id`.
    /// Used when an unfollow severs the relation.
    async fn remove_author_entries(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> Result<usize, StoreError>;
}

/// Follow edges stored in both directions.
#[async_trait]
pub trait FollowGraphStore: Send + Sync {
    /// Whether `follower_id` already follows `followed_user_id`.
    async fn edge_exists(
        &self,
        followed_user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Record an edge in both the by-followed and by-follower tables.
    /// Idempotent: re-inserting an existing edge keeps the original `since`.
    async fn insert_edge(&self, edge: &FollowEdge) -> Result<(), StoreError>;

    /// Delete an edge from both tables. Returns `false` when no edge existed.
    async fn remove_edge(
        &self,
        followed_user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Everyone following `user_id`.
    async fn followers_of(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Everyone `user_id` follows.
    async fn followings_of(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// Read-through/write-through cache in front of [`TimelineStore`].
///
/// A cold or expired key yields an empty page, not an error; callers treat
/// emptiness as a miss and fall back to storage. Writes refresh the TTL.
#[async_trait]
pub trait TimelineCache: Send + Sync {
    /// Newest cached rows for `owner_id` strictly older than `before`,
    /// capped at `limit`. Empty on a cold key.
    async fn page(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, CacheError>;

    /// Add one row to `owner_id`'s cached timeline, refreshing the TTL.
    async fn put(&self, owner_id: Uuid, entry: &TimelineEntry) -> Result<(), CacheError>;

    /// Bulk-load rows after a storage read, refreshing the TTL.
    async fn fill(&self, owner_id: Uuid, entries: &[TimelineEntry]) -> Result<(), CacheError>;

    /// Drop `owner_id`'s cached timeline entirely.
    async fn invalidate(&self, owner_id: Uuid) -> Result<(), CacheError>;
}

/// Durable at-least-once queue carrying fan-out retry messages.
#[async_trait]
pub trait FanoutRetryQueue: Send + Sync {
    /// Publish a retry message.
    async fn enqueue(&self, message: FanoutRetryMessage) -> Result<(), QueueError>;

    /// Receive the next message, or `None` once the queue is closed and
    /// drained. Blocks while the queue is open but empty.
    async fn dequeue(&self) -> Result<Option<FanoutRetryMessage>, QueueError>;
}

/// Terminal sink for messages that exhausted their retry budget.
///
/// Delivery here is an operator hand-off (alerting, inspection tooling);
/// nothing re-enters the pipeline automatically.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Record a message that will not be retried again.
    async fn deliver(&self, message: FanoutRetryMessage, reason: &str) -> Result<(), QueueError>;
}
