//! Cache Store Module
//!
//! Byte-level cache engine: a sharded key space with TTL expiration,
//! optional LRU capacity eviction and single-flight computation.
//!
//! Keys are hashed into independent shards, each behind its own lock, so
//! operations on unrelated keys never contend. Per-key operations are
//! linearizable through the shard's exclusive lock; no lock is held across
//! an await point.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::flight::{FlightGroup, JoinOutcome};
use crate::cache::shard::{Lookup, Shard};
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Store ==
/// Sharded in-memory store for opaque payloads.
///
/// Cheap to clone; clones share the same underlying shards, statistics and
/// flight registry.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// Independent lock domains the key space is hashed into
    shards: Vec<RwLock<Shard>>,
    /// Per-key registry of in-flight computations
    flights: FlightGroup,
    /// Shared performance counters
    stats: StatsRecorder,
    /// Time source for every expiration decision
    clock: Arc<dyn Clock>,
}

impl Store {
    // == Constructors ==
    /// Creates a new Store from configuration, using the system clock.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a new Store with an explicit clock.
    ///
    /// The configured capacity is split across shards (rounded up), so the
    /// total entry count is bounded by roughly `capacity`, enforced per
    /// shard.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let shard_count = config.shard_count.max(1);
        let per_shard_cap = config
            .capacity
            .map(|cap| ((cap + shard_count - 1) / shard_count).max(1));

        let shards = (0..shard_count)
            .map(|_| RwLock::new(Shard::new(per_shard_cap)))
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                shards,
                flights: FlightGroup::new(),
                stats: StatsRecorder::default(),
                clock,
            }),
        }
    }

    // == Get ==
    /// Retrieves the payload for `key` if present and not expired.
    ///
    /// An expired entry behaves as absent and is reclaimed on the spot,
    /// whether or not the background sweeper has run.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    // == Set ==
    /// Stores a payload under `key`, inserting or atomically replacing.
    ///
    /// `ttl` of None means the entry never expires. A zero TTL, an empty or
    /// oversized key, or an oversized value fail with `InvalidArgument`
    /// before any mutation.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_ttl(ttl)?;
        validate_value(value.len())?;

        self.inner.insert(key, value, ttl);
        Ok(())
    }

    // == Remove ==
    /// Deletes the entry for `key`, reporting whether a deletion occurred.
    ///
    /// Removing an absent key is a documented no-op, never an error.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.shard_for(key).write().remove(key)
    }

    // == Get Or Compute ==
    /// Returns the cached payload for `key`, or runs `compute` to produce
    /// it.
    ///
    /// Concurrent callers for the same key share a single `compute`
    /// invocation (single-flight); every waiter receives the same bytes, or
    /// the same `ComputeFailed` error if the computation fails, in which
    /// case nothing is cached. Calls on distinct keys run independently.
    ///
    /// The cache never retries `compute`; retry policy belongs to the
    /// caller.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        self.get_or_compute_with_cancel(key, ttl, compute, std::future::pending())
            .await
    }

    /// Like [`Store::get_or_compute`], honoring a caller-supplied cancel
    /// future (pass `tokio::time::sleep(..)` for a timeout).
    ///
    /// A cancelling waiter gets `Cancelled`; the shared computation keeps
    /// running for the remaining waiters and is aborted only when the last
    /// one leaves.
    pub async fn get_or_compute_with_cancel<F, Fut, C>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
        cancel: C,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
        C: Future<Output = ()>,
    {
        self.compute_raw(
            key,
            ttl,
            move || {
                let fut = compute();
                async move { fut.await.map_err(CacheError::compute_failed) }
            },
            cancel,
        )
        .await
    }

    /// Single-flight engine shared by the byte-level API and the typed
    /// facade; `compute` already speaks the cache's error taxonomy.
    pub(crate) async fn compute_raw<F, Fut, C>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
        cancel: C,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
        C: Future<Output = ()>,
    {
        validate_key(key)?;
        validate_ttl(ttl)?;

        // Fresh hit: no flight needed
        if let Some(value) = self.inner.get(key) {
            return Ok(value);
        }

        let inner = Arc::clone(&self.inner);
        let key_owned = key.to_string();
        let outcome = self.inner.flights.join_or_lead(key, move |tx| {
            let fut = compute();
            tokio::spawn(async move {
                let result = match fut.await {
                    Ok(bytes) => match validate_value(bytes.len()) {
                        Ok(()) => {
                            inner.insert(&key_owned, bytes.clone(), ttl);
                            Ok(bytes)
                        }
                        Err(err) => Err(err),
                    },
                    Err(err) => Err(err),
                };
                // Publish first so waiters subscribed before deregistration
                // and after both observe the result
                let _ = tx.send(Some(result));
                inner.flights.complete(&key_owned);
            })
        });
        let mut rx = match outcome {
            JoinOutcome::Led(rx) | JoinOutcome::Joined(rx) => rx,
        };

        let wait = async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if let Some(result) = current.as_ref() {
                        break result.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    // The flight task died without publishing; clear the
                    // registration so later callers start fresh
                    self.inner.flights.complete(key);
                    break Err(CacheError::compute_failed(anyhow::anyhow!(
                        "computation ended without producing a result"
                    )));
                }
            }
        };

        tokio::select! {
            biased;
            result = wait => result,
            _ = cancel => {
                self.inner.flights.leave(key);
                Err(CacheError::Cancelled)
            }
        }
    }

    // == Sweep Expired ==
    /// Removes up to `limit` expired entries across all shards, locking one
    /// shard at a time.
    ///
    /// Returns the number of entries reclaimed. Called periodically by the
    /// background sweeper; safe to call directly.
    pub fn sweep_expired(&self, limit: usize) -> usize {
        let now = self.inner.clock.now_ms();

        let mut remaining = limit;
        let mut removed = 0;
        for shard in &self.inner.shards {
            if remaining == 0 {
                break;
            }
            let swept = shard.write().sweep(now, remaining);
            removed += swept;
            remaining -= swept;
        }

        if removed > 0 {
            self.inner.stats.record_expired(removed as u64);
        }
        removed
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len())
    }

    // == Length ==
    /// Returns the current number of entries across all shards.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|s| s.read().len()).sum()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StoreInner {
    /// Picks the shard responsible for `key`.
    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Expiration-aware lookup with stats accounting.
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now_ms();

        match self.shard_for(key).write().lookup(key, now) {
            Lookup::Hit(value) => {
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                self.stats.record_expired(1);
                self.stats.record_miss();
                None
            }
            Lookup::Miss => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Unvalidated insert shared by `set` and completed flights.
    fn insert(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let now = self.clock.now_ms();
        let entry = CacheEntry::new(value, now, ttl);

        let evicted = self.shard_for(key).write().insert(key, entry);
        if let Some(evicted) = evicted {
            self.stats.record_eviction();
            debug!(key = %evicted, "evicted least recently used entry");
        }
    }
}

// == Validation ==
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Key must not be empty".to_string(),
        ));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidArgument(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn validate_ttl(ttl: Option<Duration>) -> Result<()> {
    if matches!(ttl, Some(d) if d.is_zero()) {
        return Err(CacheError::InvalidArgument(
            "TTL must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_value(len: usize) -> Result<()> {
    if len > MAX_VALUE_SIZE {
        return Err(CacheError::InvalidArgument(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}
