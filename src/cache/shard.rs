//! Shard Module
//!
//! One lock domain of the sharded store: a key-to-entry map plus the LRU
//! order used for optional capacity eviction.
//!
//! Every method here runs under the owning shard's exclusive lock; nothing
//! in this module locks or awaits.

use std::collections::HashMap;

use crate::cache::{CacheEntry, LruList};

// == Lookup Outcome ==
/// Result of an expiration-aware lookup inside one shard.
#[derive(Debug)]
pub(crate) enum Lookup {
    /// Present and fresh; carries a copy of the payload
    Hit(Vec<u8>),
    /// Present but past its deadline; the entry has been reclaimed
    Expired,
    /// No entry for the key
    Miss,
}

// == Shard ==
/// A slice of the key space with its own entries and recency order.
#[derive(Debug)]
pub(crate) struct Shard {
    /// Key-value storage for this shard
    entries: HashMap<String, CacheEntry>,
    /// Recency order, maintained only when a capacity is configured
    lru: LruList,
    /// Maximum entries this shard may hold, None = unbounded
    max_entries: Option<usize>,
}

impl Shard {
    // == Constructor ==
    /// Creates an empty shard with an optional per-shard capacity.
    pub(crate) fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruList::new(),
            max_entries,
        }
    }

    // == Insert ==
    /// Inserts or replaces the entry for `key`.
    ///
    /// When the shard is at capacity and the key is new, the least recently
    /// used entry is evicted first and its key returned.
    pub(crate) fn insert(&mut self, key: &str, entry: CacheEntry) -> Option<String> {
        let is_overwrite = self.entries.contains_key(key);

        let mut evicted = None;
        if let Some(max) = self.max_entries {
            if !is_overwrite && self.entries.len() >= max {
                if let Some(oldest) = self.lru.pop_oldest() {
                    self.entries.remove(&oldest);
                    evicted = Some(oldest);
                }
            }
        }

        self.entries.insert(key.to_string(), entry);
        if self.max_entries.is_some() {
            self.lru.touch(key);
        }

        evicted
    }

    // == Lookup ==
    /// Expiration-aware lookup.
    ///
    /// A fresh entry has its access metadata updated; an expired entry is
    /// reclaimed on the spot (lazy expiration) and reported as such so the
    /// store can account for it.
    pub(crate) fn lookup(&mut self, key: &str, now_ms: u64) -> Lookup {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now_ms),
            None => return Lookup::Miss,
        };

        if expired {
            self.entries.remove(key);
            self.lru.forget(key);
            return Lookup::Expired;
        }

        let Some(entry) = self.entries.get_mut(key) else {
            return Lookup::Miss;
        };
        entry.touch(now_ms);
        let value = entry.value.clone();

        if self.max_entries.is_some() {
            self.lru.touch(key);
        }
        Lookup::Hit(value)
    }

    // == Remove ==
    /// Deletes the entry for `key`, reporting whether one existed.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.forget(key);
            true
        } else {
            false
        }
    }

    // == Sweep ==
    /// Removes up to `limit` expired entries, returning how many went.
    pub(crate) fn sweep(&mut self, now_ms: u64, limit: usize) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.forget(key);
        }

        expired_keys.len()
    }

    // == Length ==
    /// Returns the number of entries in this shard.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
