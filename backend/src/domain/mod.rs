//! Domain entities, ports, and the fan-out engines.
//!
//! Purpose: implement the write/read duality of the home timeline — eager
//! fan-out at post time, read-time merging, and the hybrid escalation for
//! high-fan-out authors — against storage ports, with no transport or driver
//! concerns. Types are immutable; invariants and serialisation contracts are
//! documented on each type's Rustdoc.

pub mod batch;
pub mod error;
pub mod fanout_read;
pub mod fanout_write;
pub mod follow;
pub mod follow_service;
pub mod ports;
pub mod post;
pub mod retry;
pub mod retry_worker;
pub mod shard;
pub mod timeline;
pub mod timeline_query;

pub use self::error::{DomainResult, Error};
pub use self::fanout_read::{FanoutReadEngine, ReadMergeConfig};
pub use self::fanout_write::{FanoutConfig, FanoutError, FanoutOutcome, FanoutWriteEngine};
pub use self::follow::FollowEdge;
pub use self::follow_service::FollowService;
pub use self::post::{MAX_CONTENT_LEN, Post, PostValidationError, validate_content};
pub use self::retry::FanoutRetryMessage;
pub use self::retry_worker::{MAX_FANOUT_ATTEMPTS, RetryQueueProcessor};
pub use self::shard::{DEFAULT_DATA_SHARD_COUNT, ShardKey, ShardRouter};
pub use self::timeline::TimelineEntry;
pub use self::timeline_query::TimelineQueryService;
