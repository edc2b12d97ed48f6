//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Number of independent lock shards the key space is hashed into
    pub shard_count: usize,
    /// Maximum number of entries across the whole cache (approximate,
    /// enforced per shard). None = unbounded, no eviction
    pub capacity: Option<usize>,
    /// Interval between background sweep runs
    pub sweep_interval: Duration,
    /// Maximum number of expired entries removed per sweep run
    pub sweep_batch_limit: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SHARDS` - Number of lock shards (default: 16)
    /// - `CACHE_CAPACITY` - Maximum entries, unset = unbounded (default: unset)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 30)
    /// - `CACHE_SWEEP_BATCH_LIMIT` - Max removals per sweep run (default: 1024)
    pub fn from_env() -> Self {
        Self {
            shard_count: env::var("CACHE_SHARDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
            capacity: env::var("CACHE_CAPACITY").ok().and_then(|v| v.parse().ok()),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
            sweep_batch_limit: env::var("CACHE_SWEEP_BATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard_count: 16,
            capacity: None,
            sweep_interval: Duration::from_secs(30),
            sweep_batch_limit: 1024,
        }
    }
}
