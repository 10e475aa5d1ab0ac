//! Single-flight refresh coordination.
//!
//! One [`RefreshCoordinator`] lives in each client. The first request that
//! needs new credentials becomes the leader and performs the refresh
//! exchange; every request that arrives while the exchange is in flight
//! parks a continuation in the pending queue and waits for the leader's
//! outcome.
//!
//! Every settled cycle bumps a generation counter. A request remembers the
//! generation it was dispatched under; if a cycle settled since then, its
//! 401 is answered with that cycle's outcome instead of a new exchange.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// How a refresh cycle ended, as seen by the parked requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens are in the store; replay the request.
    Refreshed,
    /// The session is gone; fail the request with this reason.
    Failed(String),
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    generation: u64,
    last_outcome: Option<RefreshOutcome>,
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Refresh gate and pending request queue.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// Role handed out by [`RefreshCoordinator::join`].
pub enum RefreshTicket<'a> {
    /// No refresh was in flight; the holder must run one and settle it.
    Leader(RefreshLeader<'a>),
    /// A refresh is in flight; await the receiver for its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
    /// A cycle settled after the caller's generation; this is its outcome.
    Settled(RefreshOutcome),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generation of the most recently settled cycle.
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Enter the refresh path as a caller that last saw generation `seen`.
    ///
    /// The generation check, the `refreshing` check and its update happen
    /// under one lock acquisition, so exactly one concurrent caller becomes
    /// leader and no caller starts a cycle for credentials already replaced.
    pub fn join(&self, seen: u64) -> RefreshTicket<'_> {
        let mut state = self.state();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            return RefreshTicket::Waiter(rx);
        }

        if state.generation != seen {
            if let Some(outcome) = state.last_outcome.clone() {
                return RefreshTicket::Settled(outcome);
            }
        }

        state.refreshing = true;
        RefreshTicket::Leader(RefreshLeader {
            coordinator: self,
            settled: false,
        })
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state().refreshing
    }

    /// Number of parked requests.
    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let pending = {
            let mut state = self.state();
            state.refreshing = false;
            state.generation += 1;
            state.last_outcome = Some(outcome.clone());
            std::mem::take(&mut state.pending)
        };

        let count = pending.len();
        for waiter in pending {
            // A waiter whose caller gave up has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Exclusive right to run the current refresh exchange.
///
/// Dropping a leader without settling it fails the cycle, so parked requests
/// never hang on an abandoned exchange.
pub struct RefreshLeader<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLeader<'_> {
    /// Close the cycle, waking every parked request in enqueue order.
    /// Returns the number of requests woken.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLeader<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(RefreshOutcome::Failed("refresh abandoned".to_string()));
        }
    }
}
