//! Follow and unfollow orchestration.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{DomainResult, Error};
use super::follow::FollowEdge;
use super::ports::{FollowGraphStore, TimelineCache, TimelineStore};

/// Maintains the follow graph and the timeline consequences of edits.
pub struct FollowService {
    follow_graph: Arc<dyn FollowGraphStore>,
    timelines: Arc<dyn TimelineStore>,
    cache: Arc<dyn TimelineCache>,
    clock: Arc<dyn Clock>,
}

impl FollowService {
    /// Wire the service against its ports.
    pub fn new(
        follow_graph: Arc<dyn FollowGraphStore>,
        timelines: Arc<dyn TimelineStore>,
        cache: Arc<dyn TimelineCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            follow_graph,
            timelines,
            cache,
            clock,
        }
    }

    /// Record that `follower_id` now follows `followed_user_id`.
    ///
    /// Self-follows and duplicate edges are conflicts, never silently
    /// absorbed: the caller asked for a state change that cannot happen.
    pub async fn follow(
        &self,
        followed_user_id: Uuid,
        follower_id: Uuid,
    ) -> DomainResult<FollowEdge> {
        validate_pair(followed_user_id, follower_id)?;

        if self
            .follow_graph
            .edge_exists(followed_user_id, follower_id)
            .await?
        {
            return Err(Error::conflict("already following this user"));
        }

        let edge = FollowEdge::new(followed_user_id, follower_id, self.clock.utc());
        self.follow_graph.insert_edge(&edge).await?;
        info!(followed = %followed_user_id, follower = %follower_id, "follow recorded");
        Ok(edge)
    }

    /// Remove the follow relation and its materialised traces.
    ///
    /// The ex-followee's rows are purged from the follower's timeline and
    /// the follower's cached page is dropped. Both clean-ups are best
    /// effort: the edge removal is the authoritative change, and a failed
    /// purge only leaves stale rows that storage compaction or the next
    /// fan-out cycle will not resurrect.
    pub async fn unfollow(&self, followed_user_id: Uuid, follower_id: Uuid) -> DomainResult<()> {
        validate_pair(followed_user_id, follower_id)?;

        let removed = self
            .follow_graph
            .remove_edge(followed_user_id, follower_id)
            .await?;
        if !removed {
            return Err(Error::conflict("not following this user"));
        }

        match self
            .timelines
            .remove_author_entries(follower_id, followed_user_id)
            .await
        {
            Ok(purged) => {
                info!(
                    followed = %followed_user_id,
                    follower = %follower_id,
                    purged,
                    "unfollow purged timeline rows"
                );
            }
            Err(error) => {
                warn!(
                    followed = %followed_user_id,
                    follower = %follower_id,
                    %error,
                    "unfollow timeline purge failed"
                );
            }
        }

        if let Err(error) = self.cache.invalidate(follower_id).await {
            warn!(follower = %follower_id, %error, "unfollow cache invalidation failed");
        }

        Ok(())
    }
}

fn validate_pair(followed_user_id: Uuid, follower_id: Uuid) -> DomainResult<()> {
    if followed_user_id.is_nil() || follower_id.is_nil() {
        return Err(Error::validation("both user ids are required"));
    }
    if followed_user_id == follower_id {
        return Err(Error::conflict("cannot follow yourself"));
    }
    Ok(())
}
