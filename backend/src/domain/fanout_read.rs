//! Read-time timeline merging.
//!
//! Instead of materialising copies at post time, this path pulls each
//! followee's recent posts when the timeline is requested and merges them by
//! recency. It serves viewers of celebrity authors (whose eager fan-out is
//! deferred) and doubles as the system's alternative strategy when eager
//! delivery is uneconomical.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use pagination::CursorPage;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::DomainResult;
use super::ports::{AuthorPostsStore, FollowGraphStore};
use super::post::Post;

/// Tunables for read-time merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMergeConfig {
    /// Concurrent per-followee queries in flight.
    pub max_parallelism: usize,
    /// Posts fetched per followee per page; bounds total rows pulled.
    pub per_author_fetch: usize,
    /// Deadline per followee read; a stalled partition drops out of the
    /// merge instead of stalling the whole page.
    pub per_author_deadline: Duration,
}

impl Default for ReadMergeConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            per_author_fetch: 10,
            per_author_deadline: Duration::from_secs(2),
        }
    }
}

/// Merges followees' recent posts into a timeline page at read time.
pub struct FanoutReadEngine {
    follow_graph: Arc<dyn FollowGraphStore>,
    author_posts: Arc<dyn AuthorPostsStore>,
    config: ReadMergeConfig,
}

impl FanoutReadEngine {
    /// Wire the engine against its ports.
    pub fn new(
        follow_graph: Arc<dyn FollowGraphStore>,
        author_posts: Arc<dyn AuthorPostsStore>,
        config: ReadMergeConfig,
    ) -> Self {
        Self {
            follow_graph,
            author_posts,
            config,
        }
    }

    /// Compute one timeline page for `viewer_id` by live merge.
    ///
    /// The followee set includes the viewer (own posts appear in the feed)
    /// and is capped at `page_size`: a viewer following more accounts than
    /// one page holds will not see all of them represented in a single page.
    /// That cap is a deliberate fan-in cost ceiling, not an oversight.
    ///
    /// A followee whose query fails is logged and simply absent from the
    /// merge; one slow or broken partition degrades the page rather than
    /// failing it.
    pub async fn timeline(
        &self,
        viewer_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        page_size: usize,
    ) -> DomainResult<CursorPage<Post>> {
        let mut sources = self.follow_graph.followings_of(viewer_id).await?;
        sources.push(viewer_id);
        sources.truncate(page_size.max(1));

        debug!(
            viewer_id = %viewer_id,
            sources = sources.len(),
            "merging followee feeds"
        );

        let per_author_fetch = self.config.per_author_fetch;
        let deadline = self.config.per_author_deadline;
        let author_posts = &self.author_posts;
        let fetched: Vec<Vec<Post>> = stream::iter(sources)
            .map(|author_id| async move {
                let read = author_posts.recent_by_author(author_id, cursor, per_author_fetch);
                match tokio::time::timeout(deadline, read).await {
                    Ok(Ok(posts)) => posts,
                    Ok(Err(error)) => {
                        warn!(
                            author_id = %author_id,
                            %error,
                            "followee read failed, dropping from merge"
                        );
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(author_id = %author_id, "followee read timed out, dropping from merge");
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.config.max_parallelism.max(1))
            .collect()
            .await;

        let mut merged: Vec<Post> = fetched.into_iter().flatten().collect();
        merged.sort_unstable_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        merged.truncate(page_size);

        Ok(CursorPage::from_newest_first(merged, page_size))
    }
}
