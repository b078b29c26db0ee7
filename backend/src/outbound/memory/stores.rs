//! In-memory sharded store adapters.
//!
//! Process-local implementations of the storage ports, used by tests and
//! single-node runs. They are deliberately not toys in one respect: data is
//! physically partitioned into per-shard maps and every call derives its
//! shard from the entity id through [`ShardRouter`], exactly as a networked
//! backend would. User and follow-graph data lives on the reserved shard.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::ports::{
    AuthorPostsStore, FollowGraphStore, PostStore, StoreError, TimelineStore,
};
use crate::domain::{FollowEdge, Post, ShardRouter, TimelineEntry};

/// Newest-first row set keyed by `(created_at, id)` within one partition.
type TimeOrdered<V> = BTreeMap<(DateTime<Utc>, Uuid), V>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Collect up to `limit` rows newer-to-older, strictly before `before`.
fn page_desc<V: Clone>(
    rows: &TimeOrdered<V>,
    before: Option<DateTime<Utc>>,
    limit: usize,
) -> Vec<V> {
    rows.iter()
        .rev()
        .filter(|((created_at, _), _)| before.is_none_or(|cursor| *created_at < cursor))
        .take(limit)
        .map(|(_, value)| value.clone())
        .collect()
}

/// Per-shard storage cells addressed through the router.
struct Sharded<T> {
    router: ShardRouter,
    shards: Vec<RwLock<T>>,
}

impl<T: Default> Sharded<T> {
    fn new(router: ShardRouter) -> Self {
        let shards = (0..router.data_shard_count())
            .map(|_| RwLock::new(T::default()))
            .collect();
        Self { router, shards }
    }

    /// The shard cell owning `entity_id`'s rows.
    ///
    /// Router indices are 1..=N and `shards` holds exactly N cells, so the
    /// lookup cannot miss.
    fn shard_for(&self, entity_id: Uuid) -> &RwLock<T> {
        let index = self.router.data_shard_for(entity_id).index() as usize;
        self.shards
            .get(index.saturating_sub(1))
            .expect("shard index within router range")
    }
}

/// Post-by-id store partitioned by post id.
pub struct InMemoryPostStore {
    cells: Sharded<HashMap<Uuid, Post>>,
}

impl InMemoryPostStore {
    /// Build over `router`'s shard layout.
    #[must_use]
    pub fn new(router: ShardRouter) -> Self {
        Self {
            cells: Sharded::new(router),
        }
    }
}

impl Default for InMemoryPostStore {
    fn default() -> Self {
        Self::new(ShardRouter::default())
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert(&self, post: &Post) -> Result<(), StoreError> {
        write(self.cells.shard_for(post.id)).insert(post.id, post.clone());
        Ok(())
    }

    async fn find_by_id(&self, post_id: Uuid) -> Result<Option<Post>, StoreError> {
        Ok(read(self.cells.shard_for(post_id)).get(&post_id).cloned())
    }
}

/// Author feed store: partition key author id, clustering key
/// `(created_at desc, post_id)`.
pub struct InMemoryAuthorPostsStore {
    cells: Sharded<HashMap<Uuid, TimeOrdered<Post>>>,
}

impl InMemoryAuthorPostsStore {
    /// Build over `router`'s shard layout.
    #[must_use]
    pub fn new(router: ShardRouter) -> Self {
        Self {
            cells: Sharded::new(router),
        }
    }
}

impl Default for InMemoryAuthorPostsStore {
    fn default() -> Self {
        Self::new(ShardRouter::default())
    }
}

#[async_trait]
impl AuthorPostsStore for InMemoryAuthorPostsStore {
    async fn insert(&self, post: &Post) -> Result<(), StoreError> {
        write(self.cells.shard_for(post.author_id))
            .entry(post.author_id)
            .or_default()
            .insert((post.created_at, post.id), post.clone());
        Ok(())
    }

    async fn recent_by_author(
        &self,
        author_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>, StoreError> {
        let guard = read(self.cells.shard_for(author_id));
        Ok(guard
            .get(&author_id)
            .map(|rows| page_desc(rows, before, limit))
            .unwrap_or_default())
    }
}

/// Timeline store: partition key timeline owner, clustering key
/// `(created_at desc, post_id)`. Upserts are keyed, so replays cannot
/// produce duplicate rows.
pub struct InMemoryTimelineStore {
    cells: Sharded<HashMap<Uuid, TimeOrdered<TimelineEntry>>>,
}

impl InMemoryTimelineStore {
    /// Build over `router`'s shard layout.
    #[must_use]
    pub fn new(router: ShardRouter) -> Self {
        Self {
            cells: Sharded::new(router),
        }
    }
}

impl Default for InMemoryTimelineStore {
    fn default() -> Self {
        Self::new(ShardRouter::default())
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn upsert_batch(&self, entries: &[TimelineEntry]) -> Result<(), StoreError> {
        // Each row routes by its own owner: one batch may touch every shard.
        for entry in entries {
            write(self.cells.shard_for(entry.owner_id))
                .entry(entry.owner_id)
                .or_default()
                .insert(entry.sort_key(), entry.clone());
        }
        Ok(())
    }

    async fn recent_for_owner(
        &self,
        owner_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>, StoreError> {
        let guard = read(self.cells.shard_for(owner_id));
        Ok(guard
            .get(&owner_id)
            .map(|rows| page_desc(rows, before, limit))
            .unwrap_or_default())
    }

    async fn remove_author_entries(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> Result<usize, StoreError> {
        let mut guard = write(self.cells.shard_for(owner_id));
        let Some(rows) = guard.get_mut(&owner_id) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, entry| entry.author_id != author_id);
        Ok(before - rows.len())
    }
}

#[derive(Default)]
struct FollowTables {
    /// followed user → followers, keyed for deterministic listing order.
    by_followed: HashMap<Uuid, BTreeMap<Uuid, FollowEdge>>,
    /// follower → followed users.
    by_follower: HashMap<Uuid, BTreeMap<Uuid, FollowEdge>>,
}

/// Follow graph on the reserved user-data shard, stored in both directions.
#[derive(Default)]
pub struct InMemoryFollowGraphStore {
    // A single cell: shard0 holds all user/follow data by design.
    tables: RwLock<FollowTables>,
}

#[async_trait]
impl FollowGraphStore for InMemoryFollowGraphStore {
    async fn edge_exists(
        &self,
        followed_user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(read(&self.tables)
            .by_followed
            .get(&followed_user_id)
            .is_some_and(|followers| followers.contains_key(&follower_id)))
    }

    async fn insert_edge(&self, edge: &FollowEdge) -> Result<(), StoreError> {
        let mut guard = write(&self.tables);
        guard
            .by_followed
            .entry(edge.followed_user_id)
            .or_default()
            .entry(edge.follower_id)
            .or_insert_with(|| edge.clone());
        guard
            .by_follower
            .entry(edge.follower_id)
            .or_default()
            .entry(edge.followed_user_id)
            .or_insert_with(|| edge.clone());
        Ok(())
    }

    async fn remove_edge(
        &self,
        followed_user_id: Uuid,
        follower_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut guard = write(&self.tables);
        let removed = guard
            .by_followed
            .get_mut(&followed_user_id)
            .is_some_and(|followers| followers.remove(&follower_id).is_some());
        if removed {
            if let Some(followings) = guard.by_follower.get_mut(&follower_id) {
                followings.remove(&followed_user_id);
            }
        }
        Ok(removed)
    }

    async fn followers_of(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(read(&self.tables)
            .by_followed
            .get(&user_id)
            .map(|followers| followers.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn followings_of(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(read(&self.tables)
            .by_follower
            .get(&user_id)
            .map(|followings| followings.keys().copied().collect())
            .unwrap_or_default())
    }
}
