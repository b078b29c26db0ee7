//! Follow-graph edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed follow relation.
///
/// Edges are stored in both directions (by followed user and by follower) so
/// either side of the relation can be listed with a single partition read.
/// Invariants: no self-follow, and at most one edge per user pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    /// The user being followed.
    pub followed_user_id: Uuid,
    /// The user who follows.
    pub follower_id: Uuid,
    /// When the relation was created.
    pub since: DateTime<Utc>,
}

impl FollowEdge {
    /// Construct an edge stamped at `since`.
    #[must_use]
    pub const fn new(followed_user_id: Uuid, follower_id: Uuid, since: DateTime<Utc>) -> Self {
        Self {
            followed_user_id,
            follower_id,
            since,
        }
    }
}
