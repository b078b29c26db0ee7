//! Fan-out retry consumer.
//!
//! A plain loop over the retry queue: each message replays the fan-out step
//! with the post's original timestamp, so redelivery upserts rather than
//! duplicates. The message carries the number of attempts already consumed;
//! a failed attempt re-enqueues with the count bumped until the budget is
//! spent, after which the message is handed to the dead-letter sink and
//! never retried automatically.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::fanout_write::FanoutWriteEngine;
use super::ports::{DeadLetterSink, FanoutRetryQueue, QueueError};
use super::retry::FanoutRetryMessage;

/// Fan-out attempts granted to one post before dead-lettering.
pub const MAX_FANOUT_ATTEMPTS: u32 = 3;

/// Consumes fan-out retry messages until the queue closes.
pub struct RetryQueueProcessor {
    engine: Arc<FanoutWriteEngine>,
    queue: Arc<dyn FanoutRetryQueue>,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl RetryQueueProcessor {
    /// Wire the processor against the engine, queue, and dead-letter sink.
    pub fn new(
        engine: Arc<FanoutWriteEngine>,
        queue: Arc<dyn FanoutRetryQueue>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            engine,
            queue,
            dead_letters,
        }
    }

    /// Drain the queue until it closes. Intended to run as a background
    /// task for the lifetime of the process.
    pub async fn run(&self) -> Result<(), QueueError> {
        while let Some(message) = self.queue.dequeue().await? {
            self.process(message).await;
        }
        info!("retry queue closed, processor stopping");
        Ok(())
    }

    /// Handle a single delivery.
    ///
    /// At-least-once semantics: this may see the same message more than
    /// once, which is safe because replayed fan-out writes are upserts.
    pub async fn process(&self, message: FanoutRetryMessage) {
        info!(
            author_id = %message.author_id,
            post_id = %message.post_id,
            attempted = message.attempted,
            "replaying fan-out"
        );

        match self.engine.fan_out_for_retry(&message).await {
            Ok(_) => {
                info!(
                    author_id = %message.author_id,
                    post_id = %message.post_id,
                    "fan-out retry succeeded"
                );
            }
            Err(fanout_error) => {
                let next = message.after_attempt();
                if next.attempted < MAX_FANOUT_ATTEMPTS {
                    warn!(
                        author_id = %next.author_id,
                        post_id = %next.post_id,
                        attempted = next.attempted,
                        %fanout_error,
                        "fan-out retry failed, re-enqueueing"
                    );
                    if let Err(queue_error) = self.queue.enqueue(next).await {
                        error!(%queue_error, "failed to re-enqueue fan-out retry");
                    }
                } else {
                    error!(
                        author_id = %next.author_id,
                        post_id = %next.post_id,
                        attempted = next.attempted,
                        %fanout_error,
                        "fan-out retry budget exhausted, dead-lettering"
                    );
                    let reason = fanout_error.to_string();
                    if let Err(queue_error) = self.dead_letters.deliver(next, &reason).await {
                        error!(%queue_error, "failed to deliver dead letter");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        AuthorPostsStore, FollowGraphStore, PostStore, TimelineCache, TimelineStore,
    };
    use crate::domain::{FanoutConfig, FollowEdge};
    use crate::outbound::cache::InMemoryTimelineCache;
    use crate::outbound::memory::{
        InMemoryAuthorPostsStore, InMemoryDeadLetterSink, InMemoryFollowGraphStore,
        InMemoryPostStore, InMemoryRetryQueue, InMemoryTimelineStore,
    };
    use crate::test_support::{FixedClock, FlakyTimelineStore};
    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    struct Harness {
        processor: RetryQueueProcessor,
        queue: Arc<InMemoryRetryQueue>,
        dead_letters: Arc<InMemoryDeadLetterSink>,
        flaky: Arc<FlakyTimelineStore>,
        follow_graph: Arc<InMemoryFollowGraphStore>,
    }

    fn harness(failures_before_success: u32) -> Harness {
        let follow_graph = Arc::new(InMemoryFollowGraphStore::default());
        let flaky = Arc::new(FlakyTimelineStore::failing(failures_before_success));
        let queue = Arc::new(InMemoryRetryQueue::default());
        let dead_letters = Arc::new(InMemoryDeadLetterSink::default());
        let engine = Arc::new(FanoutWriteEngine::new(
            Arc::new(InMemoryPostStore::default()) as Arc<dyn PostStore>,
            Arc::new(InMemoryAuthorPostsStore::default()) as Arc<dyn AuthorPostsStore>,
            Arc::clone(&follow_graph) as Arc<dyn FollowGraphStore>,
            Arc::clone(&flaky) as Arc<dyn TimelineStore>,
            Arc::new(InMemoryTimelineCache::default()) as Arc<dyn TimelineCache>,
            Arc::clone(&queue) as Arc<dyn crate::domain::ports::FanoutRetryQueue>,
            Arc::new(FixedClock::new(Utc::now())),
            FanoutConfig::default(),
        ));
        let processor = RetryQueueProcessor::new(
            engine,
            Arc::clone(&queue) as Arc<dyn FanoutRetryQueue>,
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        );
        Harness {
            processor,
            queue,
            dead_letters,
            flaky,
            follow_graph,
        }
    }

    async fn seed_followers(harness: &Harness, author: Uuid, count: usize) -> Vec<Uuid> {
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

    fn message_for(author: Uuid) -> FanoutRetryMessage {
        FanoutRetryMessage::initial(author, Uuid::new_v4(), "retry me".to_owned(), Utc::now())
    }

    /// Drive the processor by hand: pop and process until the queue drains.
    async fn drain(harness: &Harness) -> Vec<u32> {
        let mut observed_counts = Vec::new();
        while let Some(message) = harness.queue.try_dequeue() {
            observed_counts.push(message.attempted);
            harness.processor.process(message).await;
        }
        observed_counts
    }

    #[rstest]
    #[actix_rt::test]
    async fn two_failures_then_success_converges_with_counter_at_two() {
        let harness = harness(2);
        let author = Uuid::new_v4();
        let followers = seed_followers(&harness, author, 3).await;
        let message = message_for(author);
        let post_id = message.post_id;
        harness.queue.push(message);

        let observed = drain(&harness).await;

        // Attempt counts seen by the consumer: fresh, then two requeues.
        assert_eq!(observed, vec![0, 1, 2]);
        assert!(harness.dead_letters.is_empty());
        for follower in followers {
            let rows = harness
                .flaky
                .recent_for_owner(follower, None, 50)
                .await
                .expect("timeline read");
            let copies = rows.iter().filter(|row| row.post_id == post_id).count();
            assert_eq!(copies, 1, "eventual state matches an untroubled fan-out");
        }
    }

    #[rstest]
    #[actix_rt::test]
    async fn budget_exhaustion_dead_letters_instead_of_a_fourth_attempt() {
        let harness = harness(u32::MAX);
        let author = Uuid::new_v4();
        seed_followers(&harness, author, 2).await;
        harness.queue.push(message_for(author));

        let observed = drain(&harness).await;

        assert_eq!(observed, vec![0, 1, 2], "exactly three attempts consumed");
        assert_eq!(harness.queue.len(), 0, "nothing re-enqueued after the budget");
        let dead = harness.dead_letters.drain();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].0.attempted, MAX_FANOUT_ATTEMPTS);
    }

    #[rstest]
    #[actix_rt::test]
    async fn successful_first_attempt_touches_neither_queue_nor_dead_letters() {
        let harness = harness(0);
        let author = Uuid::new_v4();
        seed_followers(&harness, author, 2).await;
        harness.queue.push(message_for(author));

        let observed = drain(&harness).await;

        assert_eq!(observed, vec![0]);
        assert!(harness.dead_letters.is_empty());
    }
}
