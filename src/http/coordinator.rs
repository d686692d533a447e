//! Single-flight token refresh.
//!
//! The first request that hits 401 becomes the leader and runs the refresh; every
//! request that hits 401 while the leader is out parks a oneshot receiver here and
//! is released with the leader's outcome. The lock is never held across an await.
//!
//! Every new session (successful refresh, login, sign-out) bumps a generation
//! counter. A request remembers the generation it was sent under, so a 401 that
//! arrives after a cycle already finished is replayed with the newer token
//! instead of starting another refresh.

use super::error::RefreshError;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::oneshot;

pub(crate) type RefreshOutcome = Result<String, RefreshError>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    generation: u64,
    /// Access token issued by the latest generation, if it produced one.
    latest: Option<String>,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Default)]
pub(crate) struct AuthCoordinator {
    state: Mutex<RefreshState>,
    default_authorization: RwLock<Option<String>>,
}

pub(crate) enum RefreshTicket<'a> {
    Leader(RefreshGuard<'a>),
    Waiter(oneshot::Receiver<RefreshOutcome>),
    /// A newer session than the one the request was sent under already exists.
    Refreshed(String),
}

impl AuthCoordinator {
    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// For a request sent under generation `seen`: queues behind the running
    /// cycle, hands back a token issued since `seen`, or starts a cycle.
    pub(crate) fn begin_or_wait(&self, seen: u64) -> RefreshTicket<'_> {
        let mut state = self.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            return RefreshTicket::Waiter(rx);
        }
        if state.generation != seen {
            if let Some(token) = state.latest.clone() {
                return RefreshTicket::Refreshed(token);
            }
        }
        state.refreshing = true;
        RefreshTicket::Leader(RefreshGuard {
            coordinator: self,
            finished: false,
        })
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub(crate) fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    fn finish(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            if let Ok(token) = &outcome {
                state.generation += 1;
                state.latest = Some(token.clone());
            }
            std::mem::take(&mut state.waiters)
        };
        let released = waiters.len();
        for tx in waiters {
            // A waiter whose caller went away has nothing left to resume.
            let _ = tx.send(outcome.clone());
        }
        released
    }

    /// Starts a generation for a session issued outside a refresh cycle.
    pub(crate) fn adopt(&self, token: String) {
        {
            let mut state = self.lock();
            state.generation += 1;
            state.latest = Some(token.clone());
        }
        self.set_default_authorization(Some(token));
    }

    /// Starts an empty generation; late 401s from the old session no longer
    /// replay its token.
    pub(crate) fn reset(&self) {
        {
            let mut state = self.lock();
            state.generation += 1;
            state.latest = None;
        }
        self.set_default_authorization(None);
    }

    pub(crate) fn default_authorization(&self) -> Option<String> {
        self.default_authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_default_authorization(&self, token: Option<String>) {
        let mut guard = self
            .default_authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = token;
    }
}

/// Held by the leader for the whole cycle. Dropping it without `complete`
/// (the leader's future was cancelled) still clears the flag and fails the queue.
pub(crate) struct RefreshGuard<'a> {
    coordinator: &'a AuthCoordinator,
    finished: bool,
}

impl RefreshGuard<'_> {
    /// Clears the flag and hands `outcome` to every queued request. Returns how
    /// many were queued.
    pub(crate) fn complete(mut self, outcome: RefreshOutcome) -> usize {
        self.finished = true;
        self.coordinator.finish(outcome)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.coordinator.finish(Err(RefreshError::Abandoned));
        }
    }
}
