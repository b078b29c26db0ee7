//! Denormalised timeline rows.

use chrono::{DateTime, Utc};
use pagination::TimeCursored;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Post;

/// A read-optimised copy of a post in one follower's home timeline.
///
/// Rows are partitioned by `owner_id` and ordered newest-first by
/// `(created_at, post_id)`; the pair is unique within a partition, so
/// re-writing the same copy is an upsert rather than a duplicate. One post
/// yields one row per follower captured at fan-out time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// The user whose home timeline holds this copy.
    pub owner_id: Uuid,
    /// Publication instant of the source post; part of the row key.
    pub created_at: DateTime<Utc>,
    /// Identifier of the source post; tie-breaks equal timestamps.
    pub post_id: Uuid,
    /// Author of the source post.
    pub author_id: Uuid,
    /// Body copied from the source post.
    pub content: String,
}

impl TimelineEntry {
    /// Build the copy of `post` destined for `owner_id`'s timeline.
    #[must_use]
    pub fn for_owner(owner_id: Uuid, post: &Post) -> Self {
        Self {
            owner_id,
            created_at: post.created_at,
            post_id: post.id,
            author_id: post.author_id,
            content: post.content.clone(),
        }
    }

    /// Row key within the owner partition.
    #[must_use]
    pub const fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.post_id)
    }
}

impl TimeCursored for TimelineEntry {
    fn cursor_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
