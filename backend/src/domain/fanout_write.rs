//! Eager fan-out-on-write pipeline.
//!
//! Creating a post is a single-attempt pipeline with compensating retry: the
//! canonical record and the author's own feed copy are hard-failure writes,
//! while the fan-out to follower timelines is best effort. A failed fan-out
//! is converted into a retry message carrying the original timestamp, and
//! the caller still observes success — readers of affected timelines lag
//! until the retry pipeline repairs them.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::run_batched;
use super::error::{DomainResult, Error};
use super::ports::{
    AuthorPostsStore, FanoutRetryQueue, FollowGraphStore, PostStore, StoreError, TimelineCache,
    TimelineStore,
};
use super::{FanoutRetryMessage, Post, TimelineEntry, validate_content};
use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

/// Tunables governing eager fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Rows per timeline batch; must not exceed the store's native limit.
    pub batch_size: usize,
    /// Concurrent batches in flight.
    pub max_parallelism: usize,
    /// Follower count at which an author stops being fanned out eagerly and
    /// is served by the read-merge path instead.
    pub celebrity_follower_threshold: usize,
    /// Deadline per batch write; a stalled partition fails its batch only
    /// and feeds the retry pipeline instead of wedging the whole fan-out.
    pub batch_deadline: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_parallelism: 8,
            celebrity_follower_threshold: 10_000,
            batch_deadline: Duration::from_secs(5),
        }
    }
}

/// How one fan-out attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// Every follower timeline received its copy.
    Delivered {
        /// Followers written.
        followers: usize,
    },
    /// The author had no followers; nothing to write.
    NoFollowers,
    /// Follower count met the celebrity threshold; eager delivery skipped in
    /// favour of read-time merging.
    Deferred {
        /// Followers counted at decision time.
        followers: usize,
    },
}

/// Why a fan-out attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum FanoutError {
    /// The follower lookup itself failed; no timelines were attempted.
    #[error("follower lookup failed: {0}")]
    FollowerLookup(StoreError),
    /// One or more timeline batches failed.
    #[error("{failed} of {batches} timeline batches failed: {first_error}")]
    Batches {
        /// Chunks that failed.
        failed: usize,
        /// Chunks submitted.
        batches: usize,
        /// A representative error from the first failed chunk.
        first_error: StoreError,
    },
}

/// Orchestrates post creation and eager delivery to follower timelines.
pub struct FanoutWriteEngine {
    posts: Arc<dyn PostStore>,
    author_posts: Arc<dyn AuthorPostsStore>,
    follow_graph: Arc<dyn FollowGraphStore>,
    timelines: Arc<dyn TimelineStore>,
    cache: Arc<dyn TimelineCache>,
    retry_queue: Arc<dyn FanoutRetryQueue>,
    clock: Arc<dyn Clock>,
    config: FanoutConfig,
}

impl FanoutWriteEngine {
    /// Wire the engine against its ports.
    #[expect(clippy::too_many_arguments, reason = "explicit constructor wiring")]
    pub fn new(
        posts: Arc<dyn PostStore>,
        author_posts: Arc<dyn AuthorPostsStore>,
        follow_graph: Arc<dyn FollowGraphStore>,
        timelines: Arc<dyn TimelineStore>,
        cache: Arc<dyn TimelineCache>,
        retry_queue: Arc<dyn FanoutRetryQueue>,
        clock: Arc<dyn Clock>,
        config: FanoutConfig,
    ) -> Self {
        Self {
            posts,
            author_posts,
            follow_graph,
            timelines,
            cache,
            retry_queue,
            clock,
            config,
        }
    }

    /// Create a post and eagerly deliver it to follower timelines.
    ///
    /// The canonical write and the author-feed write are authoritative:
    /// either failing aborts the operation. Once both succeed the post
    /// exists, and fan-out trouble is repaired asynchronously — this method
    /// never reports a fan-out failure to the caller.
    pub async fn create_post(&self, author_id: Uuid, content: &str) -> DomainResult<Post> {
        validate_content(author_id, content)?;

        let post = Post::new(author_id, content, self.clock.utc()).map_err(Error::from)?;

        self.posts.insert(&post).await.map_err(Error::from)?;
        self.author_posts.insert(&post).await.map_err(Error::from)?;

        match self
            .fan_out(post.author_id, post.id, &post.content, post.created_at)
            .await
        {
            Ok(outcome) => debug!(author_id = %author_id, post_id = %post.id, ?outcome, "fan-out finished"),
            Err(error) => {
                warn!(
                    author_id = %author_id,
                    post_id = %post.id,
                    %error,
                    "fan-out failed, handing post to the retry queue"
                );
                self.send_to_retry_queue(&post).await;
            }
        }

        info!(author_id = %author_id, post_id = %post.id, "post created");
        Ok(post)
    }

    /// Deliver one post to every follower's timeline.
    ///
    /// Shared by the write path and the retry processor. Reusing the post's
    /// original timestamp keeps the timeline row keys identical across
    /// attempts, so replays upsert instead of duplicating.
    pub async fn fan_out(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<FanoutOutcome, FanoutError> {
        let followers = self
            .follow_graph
            .followers_of(author_id)
            .await
            .map_err(FanoutError::FollowerLookup)?;

        if followers.is_empty() {
            debug!(author_id = %author_id, "no followers, fan-out skipped");
            return Ok(FanoutOutcome::NoFollowers);
        }

        if followers.len() >= self.config.celebrity_follower_threshold {
            info!(
                author_id = %author_id,
                followers = followers.len(),
                threshold = self.config.celebrity_follower_threshold,
                "celebrity author, deferring delivery to read-time merge"
            );
            return Ok(FanoutOutcome::Deferred {
                followers: followers.len(),
            });
        }

        let entries: Vec<TimelineEntry> = followers
            .iter()
            .map(|&follower_id| TimelineEntry {
                owner_id: follower_id,
                created_at,
                post_id,
                author_id,
                content: content.to_owned(),
            })
            .collect();

        self.mirror_into_cache(&entries);

        let store = Arc::clone(&self.timelines);
        let deadline = self.config.batch_deadline;
        let outcome = run_batched(
            entries,
            self.config.batch_size,
            self.config.max_parallelism,
            move |chunk| {
                let store = Arc::clone(&store);
                async move {
                    match tokio::time::timeout(deadline, store.upsert_batch(&chunk)).await {
                        Ok(result) => result,
                        Err(_) => Err(StoreError::timeout("batch write deadline exceeded")),
                    }
                }
            },
        )
        .await;

        if outcome.all_succeeded() {
            info!(
                author_id = %author_id,
                followers = followers.len(),
                batches = outcome.batches,
                "fan-out delivered"
            );
            Ok(FanoutOutcome::Delivered {
                followers: followers.len(),
            })
        } else {
            let failed = outcome.failures.len();
            let batches = outcome.batches;
            let first_error = outcome
                .failures
                .into_iter()
                .map(|failure| failure.error)
                .next()
                .unwrap_or_else(|| StoreError::query("unknown batch failure"));
            Err(FanoutError::Batches {
                failed,
                batches,
                first_error,
            })
        }
    }

    /// Replay fan-out for a retry message, reusing its original timestamp.
    pub async fn fan_out_for_retry(
        &self,
        message: &FanoutRetryMessage,
    ) -> Result<FanoutOutcome, FanoutError> {
        self.fan_out(
            message.author_id,
            message.post_id,
            &message.content,
            message.created_at,
        )
        .await
    }

    /// Mirror freshly fanned-out rows into the cache, detached from the
    /// write path: cache trouble must never block or fail a post.
    fn mirror_into_cache(&self, entries: &[TimelineEntry]) {
        let cache = Arc::clone(&self.cache);
        let entries = entries.to_vec();
        tokio::spawn(async move {
            for entry in entries {
                if let Err(error) = cache.put(entry.owner_id, &entry).await {
                    debug!(owner_id = %entry.owner_id, %error, "cache mirror write dropped");
                }
            }
        });
    }

    async fn send_to_retry_queue(&self, post: &Post) {
        let message = FanoutRetryMessage::initial(
            post.author_id,
            post.id,
            post.content.clone(),
            post.created_at,
        );
        if let Err(error) = self.retry_queue.enqueue(message).await {
            // Nothing else to do inline: the post exists and fan-out repair
            // now depends on operator attention.
            tracing::error!(
                author_id = %post.author_id,
                post_id = %post.id,
                %error,
                "failed to enqueue fan-out retry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FollowEdge, MAX_CONTENT_LEN};
    use crate::outbound::cache::InMemoryTimelineCache;
    use crate::outbound::memory::{
        InMemoryAuthorPostsStore, InMemoryFollowGraphStore, InMemoryPostStore,
        InMemoryRetryQueue, InMemoryTimelineStore,
    };
    use crate::test_support::{FixedClock, FlakyTimelineStore};
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    struct Harness {
        engine: FanoutWriteEngine,
        posts: Arc<InMemoryPostStore>,
        author_posts: Arc<InMemoryAuthorPostsStore>,
        follow_graph: Arc<InMemoryFollowGraphStore>,
        timelines: Arc<InMemoryTimelineStore>,
        retry_queue: Arc<InMemoryRetryQueue>,
    }

    fn harness_with_timelines(timelines: Arc<dyn TimelineStore>, config: FanoutConfig) -> Harness {
        let posts = Arc::new(InMemoryPostStore::default());
        let author_posts = Arc::new(InMemoryAuthorPostsStore::default());
        let follow_graph = Arc::new(InMemoryFollowGraphStore::default());
        let plain_timelines = Arc::new(InMemoryTimelineStore::default());
        let retry_queue = Arc::new(InMemoryRetryQueue::default());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let engine = FanoutWriteEngine::new(
            Arc::clone(&posts) as Arc<dyn PostStore>,
            Arc::clone(&author_posts) as Arc<dyn AuthorPostsStore>,
            Arc::clone(&follow_graph) as Arc<dyn FollowGraphStore>,
            timelines,
            Arc::new(InMemoryTimelineCache::default()) as Arc<dyn TimelineCache>,
            Arc::clone(&retry_queue) as Arc<dyn FanoutRetryQueue>,
            clock,
            config,
        );
        Harness {
            engine,
            posts,
            author_posts,
            follow_graph,
            timelines: plain_timelines,
            retry_queue,
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let timelines = Arc::new(InMemoryTimelineStore::default());
        let mut built = harness_with_timelines(
            Arc::clone(&timelines) as Arc<dyn TimelineStore>,
            FanoutConfig::default(),
        );
        built.timelines = timelines;
        built
    }

    async fn follow_many(harness: &Harness, author: Uuid, count: usize) -> Vec<Uuid> {
        let mut followers = Vec::new();
        for _ in 0..count {
            let follower = Uuid::new_v4();
            harness
                .follow_graph
                .insert_edge(&FollowEdge::new(author, follower, Utc::now()))
                .await
                .expect("edge stored");
            followers.push(follower);
        }
        followers
    }

    #[rstest]
    #[actix_rt::test]
    async fn created_post_echoes_content_and_lands_in_author_feed(harness: Harness) {
        let author = Uuid::new_v4();
        let post = harness
            .engine
            .create_post(author, "hello")
            .await
            .expect("post created");

        assert_eq!(post.content, "hello");
        assert_eq!(post.author_id, author);

        let stored = harness
            .posts
            .find_by_id(post.id)
            .await
            .expect("lookup succeeds")
            .expect("post stored");
        assert_eq!(stored, post);

        let feed = harness
            .author_posts
            .recent_by_author(author, None, 10)
            .await
            .expect("feed read");
        assert_eq!(feed, vec![post]);
    }

    #[rstest]
    #[actix_rt::test]
    async fn fan_out_writes_exactly_one_row_per_follower(harness: Harness) {
        let author = Uuid::new_v4();
        let followers = follow_many(&harness, author, 7).await;

        let post = harness
            .engine
            .create_post(author, "hello")
            .await
            .expect("post created");

        for follower in &followers {
            let rows = harness
                .timelines
                .recent_for_owner(*follower, None, 50)
                .await
                .expect("timeline read");
            let copies: Vec<_> = rows.iter().filter(|row| row.post_id == post.id).collect();
            assert_eq!(copies.len(), 1, "one copy per follower, no duplicates");
            assert_eq!(copies[0].author_id, author);
            assert_eq!(copies[0].content, "hello");
        }
    }

    #[rstest]
    #[actix_rt::test]
    async fn no_followers_means_no_timeline_rows_and_no_retry(harness: Harness) {
        let author = Uuid::new_v4();
        harness
            .engine
            .create_post(author, "into the void")
            .await
            .expect("post created");

        assert_eq!(harness.retry_queue.len(), 0);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[actix_rt::test]
    async fn blank_content_is_rejected(harness: Harness, #[case] content: &str) {
        let err = harness
            .engine
            .create_post(Uuid::new_v4(), content)
            .await
            .expect_err("rejected");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[rstest]
    #[actix_rt::test]
    async fn over_length_content_is_rejected(harness: Harness) {
        let content = "x".repeat(MAX_CONTENT_LEN + 1);
        let err = harness
            .engine
            .create_post(Uuid::new_v4(), &content)
            .await
            .expect_err("rejected");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[rstest]
    #[actix_rt::test]
    async fn nil_author_is_rejected(harness: Harness) {
        let err = harness
            .engine
            .create_post(Uuid::nil(), "hello")
            .await
            .expect_err("rejected");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[actix_rt::test]
    async fn failed_fan_out_enqueues_retry_with_original_timestamp() {
        let flaky = Arc::new(FlakyTimelineStore::failing(u32::MAX));
        let harness =
            harness_with_timelines(Arc::clone(&flaky) as Arc<dyn TimelineStore>, FanoutConfig::default());
        let author = Uuid::new_v4();
        follow_many(&harness, author, 3).await;

        let post = harness
            .engine
            .create_post(author, "hello")
            .await
            .expect("creation still succeeds");

        let queued = harness.retry_queue.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].post_id, post.id);
        assert_eq!(queued[0].created_at, post.created_at);
        assert_eq!(queued[0].attempted, 0);
    }

    #[actix_rt::test]
    async fn celebrity_authors_skip_eager_delivery() {
        let timelines = Arc::new(InMemoryTimelineStore::default());
        let config = FanoutConfig {
            celebrity_follower_threshold: 3,
            ..FanoutConfig::default()
        };
        let mut harness =
            harness_with_timelines(Arc::clone(&timelines) as Arc<dyn TimelineStore>, config);
        harness.timelines = timelines;
        let author = Uuid::new_v4();
        let followers = follow_many(&harness, author, 3).await;

        harness
            .engine
            .create_post(author, "for the masses")
            .await
            .expect("post created");

        for follower in followers {
            let rows = harness
                .timelines
                .recent_for_owner(follower, None, 50)
                .await
                .expect("timeline read");
            assert!(rows.is_empty(), "celebrity posts are not materialised");
        }
        assert_eq!(harness.retry_queue.len(), 0, "deferral is not a failure");
    }

    #[actix_rt::test]
    async fn redelivering_the_same_message_does_not_duplicate_rows() {
        let timelines = Arc::new(InMemoryTimelineStore::default());
        let mut harness = harness_with_timelines(
            Arc::clone(&timelines) as Arc<dyn TimelineStore>,
            FanoutConfig::default(),
        );
        harness.timelines = timelines;
        let author = Uuid::new_v4();
        let followers = follow_many(&harness, author, 4).await;

        let message = FanoutRetryMessage::initial(
            author,
            Uuid::new_v4(),
            "replayed".to_owned(),
            Utc::now(),
        );

        harness
            .engine
            .fan_out_for_retry(&message)
            .await
            .expect("first delivery");
        harness
            .engine
            .fan_out_for_retry(&message)
            .await
            .expect("redelivery");

        for follower in followers {
            let rows = harness
                .timelines
                .recent_for_owner(follower, None, 50)
                .await
                .expect("timeline read");
            let copies = rows
                .iter()
                .filter(|row| row.post_id == message.post_id)
                .count();
            assert_eq!(copies, 1, "redelivery must upsert, not append");
        }
    }
}
