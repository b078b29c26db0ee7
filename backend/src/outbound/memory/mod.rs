//! Process-local adapters: sharded stores, retry queue, dead-letter sinks.

mod queue;
mod stores;

pub use queue::{InMemoryDeadLetterSink, InMemoryRetryQueue, TracingDeadLetterSink};
pub use stores::{
    InMemoryAuthorPostsStore, InMemoryFollowGraphStore, InMemoryPostStore, InMemoryTimelineStore,
};
