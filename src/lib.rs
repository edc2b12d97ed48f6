//! Sidecache - an embeddable in-memory cache-aside store
//!
//! Provides a sharded key/value cache with TTL expiration, single-flight
//! loading and a typed serialization facade.

pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod tasks;

pub use cache::{CacheStats, Clock, ManualClock, Store, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use facade::Cache;
pub use tasks::{spawn_sweeper, SweeperHandle};
