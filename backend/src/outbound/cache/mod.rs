//! Timeline cache adapters.
//!
//! Two implementations of the same port: a Redis sorted-set cache for
//! deployments and a process-local cache for tests and single-node runs.
//! Both return an empty page on a cold or expired key; callers distinguish
//! "no matches" from "miss" by falling back to storage on emptiness.

mod memory;
mod redis;

pub use memory::{DEFAULT_CACHE_TTL, InMemoryTimelineCache};
pub use redis::RedisTimelineCache;
