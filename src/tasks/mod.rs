//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry sweeper: removes expired entries in bounded batches at a
//!   configured interval

mod sweeper;

pub use sweeper::{spawn_sweeper, SweeperHandle};
