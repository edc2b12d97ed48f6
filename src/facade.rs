//! Cache Facade
//!
//! Typed public API over the byte-level [`Store`]: values are serialized to
//! JSON on the way in and deserialized on the way out, keeping the store
//! itself type-agnostic.
//!
//! The facade owns the store and the background sweeper; constructing a
//! [`Cache`] starts the sweeper, [`Cache::shutdown`] stops and joins it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheStats, Clock, Store};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweeper, SweeperHandle};

// == Cache ==
/// Embeddable typed cache with TTL expiration and single-flight loading.
///
/// Must be constructed inside a tokio runtime (the sweeper is a spawned
/// task). The underlying [`Store`] can be cloned out via [`Cache::store`]
/// for byte-level access or for sharing with other components.
#[derive(Debug)]
pub struct Cache {
    store: Store,
    sweeper: Option<SweeperHandle>,
}

impl Cache {
    // == Constructors ==
    /// Creates a cache from configuration and starts its sweeper.
    pub fn new(config: &CacheConfig) -> Self {
        let store = Store::new(config);
        Self::assemble(store, config)
    }

    /// Creates a cache with an explicit clock, for deterministic tests.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Store::with_clock(config, clock);
        Self::assemble(store, config)
    }

    fn assemble(store: Store, config: &CacheConfig) -> Self {
        let sweeper = spawn_sweeper(
            store.clone(),
            config.sweep_interval,
            config.sweep_batch_limit,
        );
        Self {
            store,
            sweeper: Some(sweeper),
        }
    }

    // == Store Access ==
    /// Returns a clone of the underlying byte-level store.
    pub fn store(&self) -> Store {
        self.store.clone()
    }

    // == Get ==
    /// Retrieves and deserializes the value for `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or expired. A payload that
    /// does not deserialize to `T` fails with `Deserialization` and the
    /// entry is left untouched — a stale or incompatible schema is the
    /// caller's concern, and the raw payload stays readable via
    /// [`Cache::get_raw`].
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key) {
            Some(bytes) => {
                let value =
                    serde_json::from_slice(&bytes).map_err(CacheError::deserialization)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // == Set ==
    /// Serializes and stores a value under `key`.
    ///
    /// A serialization failure surfaces before any mutation; the previous
    /// entry, if any, is untouched.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::serialization)?;
        self.store.set(key, bytes, ttl)
    }

    // == Remove ==
    /// Deletes the entry for `key`, reporting whether a deletion occurred.
    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    // == Raw Access ==
    /// Retrieves the stored payload without deserializing it.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    /// Stores an opaque payload without serializing it.
    pub fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store.set(key, value, ttl)
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or runs `compute` to produce it
    /// (cache-aside).
    ///
    /// Serialization of the computed value happens inside the flight, so
    /// concurrent callers for the same key share one computation and one
    /// outcome; a failing `compute` reaches every waiter as `ComputeFailed`
    /// and caches nothing.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.get_or_compute_with_cancel(key, ttl, compute, std::future::pending())
            .await
    }

    /// Like [`Cache::get_or_compute`], honoring a caller-supplied cancel
    /// future (pass `tokio::time::sleep(..)` for a timeout).
    ///
    /// The cancelling waiter gets `Cancelled`; other waiters of the same
    /// flight are unaffected unless every one of them cancels.
    pub async fn get_or_compute_with_cancel<T, F, Fut, C>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
        cancel: C,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        C: Future<Output = ()>,
    {
        let bytes = self
            .store
            .compute_raw(
                key,
                ttl,
                move || {
                    let fut = compute();
                    async move {
                        let value = fut.await.map_err(CacheError::compute_failed)?;
                        serde_json::to_vec(&value).map_err(CacheError::serialization)
                    }
                },
                cancel,
            )
            .await?;

        serde_json::from_slice(&bytes).map_err(CacheError::deserialization)
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Shutdown ==
    /// Stops the background sweeper and waits for it to finish.
    ///
    /// After this returns no sweep is mid-flight. The store itself needs no
    /// teardown.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        // Best effort for caches dropped without an explicit shutdown
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn cache() -> Cache {
        Cache::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let cache = cache();
        let user = User {
            id: 7,
            name: "ada".to_string(),
        };

        cache.set("user:7", &user, None).unwrap();
        let loaded: Option<User> = cache.get("user:7").unwrap();

        assert_eq!(loaded, Some(user));
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let cache = cache();

        let loaded: Option<User> = cache.get("nobody").unwrap();
        assert_eq!(loaded, None);

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_serialization_failure_mutates_nothing() {
        let cache = cache();
        cache.set("k", &1u32, None).unwrap();

        // JSON cannot represent NaN
        let result = cache.set("k", &f64::NAN, None);

        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert_eq!(cache.get::<u32>("k").unwrap(), Some(1));
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_deserialization_failure_leaves_entry() {
        let cache = cache();
        cache.set_raw("k", b"not json at all".to_vec(), None).unwrap();

        let result = cache.get::<User>("k");
        assert!(matches!(result, Err(CacheError::Deserialization(_))));

        // The raw payload is still there and still readable
        assert_eq!(cache.get_raw("k"), Some(b"not json at all".to_vec()));
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_typed_get_or_compute() {
        let cache = cache();

        let user = cache
            .get_or_compute("user:1", None, || async {
                Ok(User {
                    id: 1,
                    name: "grace".to_string(),
                })
            })
            .await
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(
            cache.get::<User>("user:1").unwrap().map(|u| u.name),
            Some("grace".to_string())
        );
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_remove_roundtrip() {
        let cache = cache();

        cache.set("k", &42u32, None).unwrap();
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        assert!(cache.is_empty());

        cache.shutdown().await;
    }
}
