//! Flight Registry Module
//!
//! Coalesces concurrent computations for the same key into a single
//! in-flight task (single-flight).
//!
//! The first caller for a key leads: it spawns the computation and registers
//! the flight. Every later caller joins and waits on the same result
//! channel. The result is broadcast over a `watch` channel so waiters that
//! subscribe after publication still observe the final value.
//!
//! Lock discipline: the registry mutex is only ever held for map bookkeeping,
//! never across an await. Code holding a shard lock must not touch the
//! registry.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

// == Channel Types ==
/// Outcome of one flight, shared verbatim with every waiter.
pub(crate) type FlightResult = Result<Vec<u8>>;
/// Sender half handed to the flight task.
pub(crate) type ResultSender = watch::Sender<Option<FlightResult>>;
/// Receiver half held by each waiter.
pub(crate) type ResultReceiver = watch::Receiver<Option<FlightResult>>;

// == Flight State ==
/// Bookkeeping for one in-flight computation.
#[derive(Debug)]
struct FlightState {
    /// Receiver cloned out to each joining waiter
    rx: ResultReceiver,
    /// Number of callers currently waiting on this flight
    waiters: usize,
    /// Handle to the computation task, aborted when the last waiter leaves
    handle: JoinHandle<()>,
}

// == Join Outcome ==
/// Whether the caller led a new flight or joined an existing one.
pub(crate) enum JoinOutcome {
    /// This caller registered the computation
    Led(ResultReceiver),
    /// Another caller got there first; wait alongside it
    Joined(ResultReceiver),
}

// == Flight Group ==
/// Per-key registry of in-flight computations.
#[derive(Debug, Default)]
pub(crate) struct FlightGroup {
    flights: Mutex<HashMap<String, FlightState>>,
}

impl FlightGroup {
    // == Constructor ==
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // == Join Or Lead ==
    /// Joins the flight for `key` if one is registered, otherwise leads a
    /// new one.
    ///
    /// `lead` receives the sender half and must return the handle of the
    /// spawned computation task; it runs under the registry lock, so exactly
    /// one caller can lead per key.
    pub(crate) fn join_or_lead<F>(&self, key: &str, lead: F) -> JoinOutcome
    where
        F: FnOnce(ResultSender) -> JoinHandle<()>,
    {
        let mut flights = self.flights.lock();

        if let Some(state) = flights.get_mut(key) {
            state.waiters += 1;
            debug!(key, waiters = state.waiters, "joined in-flight computation");
            return JoinOutcome::Joined(state.rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        let handle = lead(tx);
        flights.insert(
            key.to_string(),
            FlightState {
                rx: rx.clone(),
                waiters: 1,
                handle,
            },
        );
        JoinOutcome::Led(rx)
    }

    // == Complete ==
    /// Deregisters the flight for `key` after its result was published.
    ///
    /// Idempotent: completing an unknown or already-removed flight is a
    /// no-op, so both the flight task and waiters observing a dead channel
    /// may call it.
    pub(crate) fn complete(&self, key: &str) {
        self.flights.lock().remove(key);
    }

    // == Leave ==
    /// Drops one waiter out of the flight for `key` before its result
    /// arrived.
    ///
    /// When the last waiter leaves, the computation task is aborted and the
    /// flight deregistered; nobody is left to consume the result.
    pub(crate) fn leave(&self, key: &str) {
        let mut flights = self.flights.lock();

        if let Some(state) = flights.get_mut(key) {
            state.waiters = state.waiters.saturating_sub(1);
            if state.waiters == 0 {
                debug!(key, "last waiter cancelled; aborting flight");
                state.handle.abort();
                flights.remove(key);
            }
        }
    }

    // == In-Flight Count ==
    /// Number of currently registered flights.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn noop_lead(tx: ResultSender) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _ = tx.send(Some(Ok(b"done".to_vec())));
        })
    }

    #[tokio::test]
    async fn test_first_caller_leads() {
        let group = FlightGroup::new();

        match group.join_or_lead("k", noop_lead) {
            JoinOutcome::Led(_) => {}
            JoinOutcome::Joined(_) => panic!("first caller must lead"),
        }
        assert_eq!(group.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_second_caller_joins() {
        let group = FlightGroup::new();

        let _first = group.join_or_lead("k", |tx| {
            tokio::spawn(async move {
                // Hold the flight open; never publish
                drop(tx);
                std::future::pending::<()>().await;
            })
        });

        match group.join_or_lead("k", |_| panic!("lead must not run for a joiner")) {
            JoinOutcome::Joined(_) => {}
            JoinOutcome::Led(_) => panic!("second caller must join"),
        }
        assert_eq!(group.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fly_independently() {
        let group = FlightGroup::new();

        let _a = group.join_or_lead("a", noop_lead);
        let _b = group.join_or_lead("b", noop_lead);

        assert_eq!(group.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_complete_deregisters() {
        let group = FlightGroup::new();

        let _ = group.join_or_lead("k", noop_lead);
        group.complete("k");
        group.complete("k"); // idempotent

        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_last_leaver_aborts_task() {
        let group = FlightGroup::new();

        let _first = group.join_or_lead("k", |tx| {
            tokio::spawn(async move {
                let _tx = tx;
                std::future::pending::<()>().await;
            })
        });
        let _second = group.join_or_lead("k", |_| unreachable!());

        group.leave("k");
        assert_eq!(group.in_flight(), 1, "one waiter left, flight stays");

        group.leave("k");
        assert_eq!(group.in_flight(), 0, "last leaver tears the flight down");
    }

    #[tokio::test]
    async fn test_leave_after_completion_is_noop() {
        let group = FlightGroup::new();

        let _ = group.join_or_lead("k", noop_lead);
        group.complete("k");
        group.leave("k");

        assert_eq!(group.in_flight(), 0);
    }
}
