//! Fan-out retry message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything needed to replay one post's fan-out.
///
/// The message carries the *original* `created_at` so a replay produces the
/// same `(owner, created_at, post_id)` timeline keys as the first attempt;
/// redelivery is therefore an upsert, which is what makes at-least-once
/// queue delivery safe here.
///
/// `attempted` counts fan-out attempts already made by the consumer. The
/// write path enqueues with `attempted = 0`; the processor retries while
/// `attempted` stays below the configured bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutRetryMessage {
    /// Author of the post being fanned out.
    pub author_id: Uuid,
    /// Identifier of the post being fanned out.
    pub post_id: Uuid,
    /// Post body to copy into follower timelines.
    pub content: String,
    /// Original publication instant; reused verbatim on every replay.
    pub created_at: DateTime<Utc>,
    /// Fan-out attempts already consumed for this post. Serialised as
    /// `retryCount`, the field name consumers on the queue already speak.
    #[serde(rename = "retryCount")]
    pub attempted: u32,
}

impl FanoutRetryMessage {
    /// First retry message for a post whose eager fan-out failed.
    #[must_use]
    pub const fn initial(
        author_id: Uuid,
        post_id: Uuid,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            author_id,
            post_id,
            content,
            created_at,
            attempted: 0,
        }
    }

    /// The same message with one more attempt recorded.
    #[must_use]
    pub fn after_attempt(&self) -> Self {
        Self {
            attempted: self.attempted.saturating_add(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_the_queue_field_names() {
        let message = FanoutRetryMessage::initial(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hello".to_owned(),
            Utc::now(),
        );
        let wire = serde_json::to_value(&message).expect("serialisable");
        for field in ["authorId", "postId", "content", "createdAt", "retryCount"] {
            assert!(wire.get(field).is_some(), "missing wire field {field}");
        }
        assert_eq!(wire["retryCount"], 0);
    }

    #[test]
    fn after_attempt_increments_only_the_counter() {
        let message = FanoutRetryMessage::initial(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hello".to_owned(),
            Utc::now(),
        );
        let next = message.after_attempt();
        assert_eq!(next.attempted, 1);
        assert_eq!(next.created_at, message.created_at);
        assert_eq!(next.post_id, message.post_id);
    }
}

