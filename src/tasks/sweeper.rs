//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! Lazy expiration alone would leak memory for write-once/never-read keys;
//! the sweeper reclaims those. Each run removes a bounded batch, and the
//! store locks one shard at a time during the sweep, so store operations are
//! never blocked for a full pass.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Store;

// == Sweeper Handle ==
/// Handle to a running sweeper task.
///
/// Dropping the handle without calling [`SweeperHandle::shutdown`] leaves
/// the task running detached; prefer an explicit shutdown so no sweep is
/// mid-flight afterwards.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for the task to finish.
    ///
    /// When this returns, no sweep is running and none will start.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }

    /// Stops the sweeper without waiting for it to wind down.
    ///
    /// Used by the facade's Drop path, where awaiting is impossible.
    pub fn abort(self) {
        self.handle.abort();
    }
}

// == Spawn ==
/// Spawns the background sweeper.
///
/// The task wakes every `interval`, asks the store to reclaim up to
/// `batch_limit` expired entries, and reports what it removed. A run that
/// removes nothing is normal and only logged at debug level.
///
/// # Arguments
/// * `store` - Store to sweep (cheap clone, shares the underlying shards)
/// * `interval` - Time between sweep runs
/// * `batch_limit` - Maximum entries removed per run
pub fn spawn_sweeper(store: Store, interval: Duration, batch_limit: usize) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            batch_limit, "expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let removed = store.sweep_expired(batch_limit);
                    if removed > 0 {
                        info!(removed, "expiry sweep reclaimed entries");
                    } else {
                        debug!("expiry sweep found nothing to reclaim");
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("expiry sweeper stopping");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        shutdown_tx,
        handle,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::CacheConfig;
    use std::sync::Arc;

    fn store_with_clock() -> (Store, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = Store::with_clock(&CacheConfig::default(), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_entries() {
        let (store, clock) = store_with_clock();

        store
            .set("expire_soon", b"value".to_vec(), Some(Duration::from_millis(5)))
            .unwrap();

        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(10), 1024);

        clock.advance(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Reclaimed by the sweep alone; no read ever touched the key
        assert_eq!(store.len(), 0);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_preserves_valid_entries() {
        let (store, clock) = store_with_clock();

        store.set("long_lived", b"value".to_vec(), Some(Duration::from_secs(3600))).unwrap();
        store.set("immortal", b"value".to_vec(), None).unwrap();

        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(10), 1024);

        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 2);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_joins_the_task() {
        let (store, _clock) = store_with_clock();

        let sweeper = spawn_sweeper(store, Duration::from_secs(3600), 1024);

        // Returns promptly even though the sweep interval is an hour
        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("shutdown must not wait for the next sweep tick");
    }
}
