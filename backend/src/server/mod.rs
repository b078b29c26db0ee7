//! Application state wiring and route registration.
//!
//! Explicit constructor wiring only: every engine receives its ports when
//! the process boots, and the retry consumer is an ordinary background task
//! looping over the queue.

pub mod config;

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;
use tracing::{info, warn};

use crate::api;
use crate::domain::ports::{
    AuthorPostsStore, DeadLetterSink, FanoutRetryQueue, FollowGraphStore, PostStore,
    TimelineCache, TimelineStore,
};
use crate::domain::{
    FanoutReadEngine, FanoutWriteEngine, FollowService, RetryQueueProcessor, ShardRouter,
    TimelineQueryService,
};
use crate::outbound::cache::{InMemoryTimelineCache, RedisTimelineCache};
use crate::outbound::memory::{
    InMemoryAuthorPostsStore, InMemoryFollowGraphStore, InMemoryPostStore, InMemoryRetryQueue,
    InMemoryTimelineStore, TracingDeadLetterSink,
};

pub use config::AppConfig;

/// Shared handles the HTTP layer needs per request.
#[derive(Clone)]
pub struct AppState {
    /// Post creation + eager fan-out.
    pub fanout_write: Arc<FanoutWriteEngine>,
    /// Read-time merge engine.
    pub fanout_read: Arc<FanoutReadEngine>,
    /// Cached materialised-timeline reads.
    pub timeline_query: Arc<TimelineQueryService>,
    /// Follow graph orchestration.
    pub follows: Arc<FollowService>,
    /// Canonical post lookups.
    pub posts: Arc<dyn PostStore>,
    /// Author feed reads.
    pub author_posts: Arc<dyn AuthorPostsStore>,
}

/// A fully wired application: request state plus the retry pipeline.
pub struct Application {
    /// Request-scoped state handed to the HTTP server.
    pub state: AppState,
    processor: Arc<RetryQueueProcessor>,
    retry_queue: Arc<InMemoryRetryQueue>,
}

impl Application {
    /// Wire the application per `config`.
    ///
    /// Storage backends are the in-process sharded adapters; the timeline
    /// cache is Redis when a URL is configured and reachable, otherwise the
    /// in-process cache. A cache is an optimisation, so an unreachable
    /// Redis degrades the deployment instead of failing the boot.
    pub async fn build(config: &AppConfig) -> Self {
        let cache: Arc<dyn TimelineCache> = match &config.redis_url {
            Some(url) => match RedisTimelineCache::connect_with_ttl(url, config.cache_ttl).await {
                Ok(redis) => {
                    info!("timeline cache backed by redis");
                    Arc::new(redis)
                }
                Err(error) => {
                    warn!(%error, "redis unavailable, using in-process timeline cache");
                    Arc::new(InMemoryTimelineCache::with_ttl(config.cache_ttl))
                }
            },
            None => Arc::new(InMemoryTimelineCache::with_ttl(config.cache_ttl)),
        };
        Self::build_with_cache(config, cache)
    }

    /// Wire the application with an explicit cache adapter.
    #[must_use]
    pub fn build_with_cache(config: &AppConfig, cache: Arc<dyn TimelineCache>) -> Self {
        let router = ShardRouter::new(config.data_shard_count);

        let posts: Arc<dyn PostStore> = Arc::new(InMemoryPostStore::new(router));
        let author_posts: Arc<dyn AuthorPostsStore> =
            Arc::new(InMemoryAuthorPostsStore::new(router));
        let timelines: Arc<dyn TimelineStore> = Arc::new(InMemoryTimelineStore::new(router));
        let follow_graph: Arc<dyn FollowGraphStore> = Arc::new(InMemoryFollowGraphStore::default());

        let retry_queue = Arc::new(InMemoryRetryQueue::default());
        let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(TracingDeadLetterSink);
        let clock = Arc::new(DefaultClock);

        let fanout_write = Arc::new(FanoutWriteEngine::new(
            Arc::clone(&posts),
            Arc::clone(&author_posts),
            Arc::clone(&follow_graph),
            Arc::clone(&timelines),
            Arc::clone(&cache),
            Arc::clone(&retry_queue) as Arc<dyn FanoutRetryQueue>,
            Arc::clone(&clock) as Arc<dyn mockable::Clock>,
            config.fanout,
        ));
        let fanout_read = Arc::new(FanoutReadEngine::new(
            Arc::clone(&follow_graph),
            Arc::clone(&author_posts),
            config.read_merge,
        ));
        let timeline_query = Arc::new(TimelineQueryService::new(
            Arc::clone(&cache),
            Arc::clone(&timelines),
        ));
        let follows = Arc::new(FollowService::new(
            Arc::clone(&follow_graph),
            Arc::clone(&timelines),
            Arc::clone(&cache),
            clock,
        ));

        let processor = Arc::new(RetryQueueProcessor::new(
            Arc::clone(&fanout_write),
            Arc::clone(&retry_queue) as Arc<dyn FanoutRetryQueue>,
            dead_letters,
        ));

        Self {
            state: AppState {
                fanout_write,
                fanout_read,
                timeline_query,
                follows,
                posts,
                author_posts,
            },
            processor,
            retry_queue,
        }
    }

    /// Start the retry consumer as a background task.
    pub fn spawn_retry_processor(&self) -> tokio::task::JoinHandle<()> {
        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            if let Err(error) = processor.run().await {
                tracing::error!(%error, "retry processor stopped with an error");
            }
        })
    }

    /// Close the retry queue so the consumer drains and stops.
    pub fn shutdown(&self) {
        self.retry_queue.close();
    }
}

/// Register every API route and the shared request state.
pub fn configure(state: AppState) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state.clone()))
            .service(api::posts::create_post)
            .service(api::posts::get_post)
            .service(api::posts::get_home_timeline)
            .service(api::posts::get_user_posts)
            .service(api::timeline::get_merged_timeline)
            .service(api::follows::follow)
            .service(api::follows::unfollow);
    }
}
