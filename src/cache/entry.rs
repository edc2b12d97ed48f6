//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//!
//! Entries never read the system time themselves; every expiration decision
//! takes a `now_ms` instant supplied by the store's [`Clock`](super::Clock).

use std::time::Duration;

// == Cache Entry ==
/// Represents a single cache entry with its opaque payload and metadata.
///
/// Owned exclusively by the store shard that holds it; callers only ever see
/// clones of the payload, never the entry itself.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload, opaque at this layer
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Last access timestamp (Unix milliseconds), updated on every read
    pub last_accessed: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `now_ms` - Current instant from the owning store's clock
    /// * `ttl` - Optional time-to-live; None means the entry never expires
    pub fn new(value: Vec<u8>, now_ms: u64, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|ttl| now_ms + ttl.as_millis() as u64);

        Self {
            value,
            created_at: now_ms,
            expires_at,
            last_accessed: now_ms,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// Boundary condition: an entry is expired once `now_ms` is greater than
    /// or equal to its expiration time, so the instant the TTL has fully
    /// elapsed the entry reads as absent.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read of this entry.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_accessed = now_ms;
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds at the given instant.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_ms)` if the entry has a TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms))
    }
}
