//! Application configuration.
//!
//! Environment-driven with builder-style overrides; every knob has a
//! default that matches the documented design constants, so a bare process
//! boots into a sensible single-node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

use crate::domain::{DEFAULT_DATA_SHARD_COUNT, FanoutConfig, ReadMergeConfig};
use crate::outbound::cache::DEFAULT_CACHE_TTL;

/// Runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Number of data shards (excluding the reserved user-data shard).
    pub data_shard_count: u32,
    /// Redis connection URL; `None` selects the in-process cache.
    pub redis_url: Option<String>,
    /// Eager fan-out tunables.
    pub fanout: FanoutConfig,
    /// Read-merge tunables.
    pub read_merge: ReadMergeConfig,
    /// Timeline cache lifetime.
    pub cache_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_shard_count: DEFAULT_DATA_SHARD_COUNT,
            redis_url: None,
            fanout: FanoutConfig::default(),
            read_merge: ReadMergeConfig::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Malformed values are logged and ignored rather than fatal: a typo in
    /// a tuning knob should not keep the service down.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = parsed_env("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(count) = parsed_env("DATA_SHARD_COUNT") {
            config.data_shard_count = count;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.trim().is_empty() {
                config.redis_url = Some(url);
            }
        }
        if let Some(size) = parsed_env("FANOUT_BATCH_SIZE") {
            config.fanout.batch_size = size;
        }
        if let Some(parallelism) = parsed_env("FANOUT_MAX_PARALLELISM") {
            config.fanout.max_parallelism = parallelism;
            config.read_merge.max_parallelism = parallelism;
        }
        if let Some(threshold) = parsed_env("CELEBRITY_FOLLOWER_THRESHOLD") {
            config.fanout.celebrity_follower_threshold = threshold;
        }
        if let Some(secs) = parsed_env::<u64>("TIMELINE_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }

        config
    }

    /// Override the bind address.
    #[must_use]
    pub const fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// Override the Redis URL.
    #[must_use]
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Override the fan-out tunables.
    #[must_use]
    pub const fn with_fanout(mut self, fanout: FanoutConfig) -> Self {
        self.fanout = fanout;
        self
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw, "ignoring malformed environment variable");
            None
        }
    }
}
