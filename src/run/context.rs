//! Per-run shared state
//!
//! Everything a verification pass mutates lives in a [`RunContext`] that is
//! handed to each component, so concurrent runs (and tests) never share
//! counters.

use crate::proxy::models::WorkingProxy;
use crate::run::progress::ProgressReporter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Point-in-time view of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub checked: usize,
    pub working: usize,
}

impl ProgressSnapshot {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.checked)
    }

    pub fn is_final(&self) -> bool {
        self.checked >= self.total
    }
}

/// Run counters
///
/// `checked <= total` and `working <= checked` hold at every point;
/// `in_flight` is the only counter that goes down. Every started probe ends
/// up either checked or abandoned.
#[derive(Debug, Default)]
pub struct RunState {
    total: AtomicUsize,
    started: AtomicUsize,
    checked: AtomicUsize,
    working: AtomicUsize,
    abandoned: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter and set the candidate total for a new pass
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.started.store(0, Ordering::Relaxed);
        self.checked.store(0, Ordering::Relaxed);
        self.working.store(0, Ordering::Relaxed);
        self.abandoned.store(0, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
        self.peak_in_flight.store(0, Ordering::Relaxed);
    }

    pub(crate) fn begin_probe(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn finish_probe(&self, working: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        if working {
            self.working.fetch_add(1, Ordering::Relaxed);
        }
        self.checked.fetch_add(1, Ordering::Relaxed);
    }

    /// A probe dropped before it reached a verdict
    pub(crate) fn abandon_probe(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Probes admitted so far, finished or not
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    pub fn checked(&self) -> usize {
        self.checked.load(Ordering::Relaxed)
    }

    pub fn working(&self) -> usize {
        self.working.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest number of probes that were ever in flight together
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total(),
            checked: self.checked(),
            working: self.working(),
        }
    }
}

/// Append-only list of proxies confirmed during the run
#[derive(Debug, Default)]
pub struct WorkingSet {
    entries: Mutex<Vec<WorkingProxy>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkingProxy>> {
        // Entries are only ever pushed, so a poisoned list is still valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, proxy: WorkingProxy) {
        self.lock().push(proxy);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the entries in confirmation order
    pub fn snapshot(&self) -> Vec<WorkingProxy> {
        self.lock().clone()
    }

    /// Copy of the entries, fastest first
    pub fn sorted_by_latency(&self) -> Vec<WorkingProxy> {
        let mut entries = self.snapshot();
        entries.sort_by_key(|p| p.latency);
        entries
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

/// Handle shared by every stage of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    state: Arc<RunState>,
    working: Arc<WorkingSet>,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            state: Arc::new(RunState::new()),
            working: Arc::new(WorkingSet::new()),
            progress: Arc::new(progress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Token that stops admission of new probes when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Start a fresh verification pass over `total` candidates
    pub fn reset(&self, total: usize) {
        self.state.reset(total);
        self.working.clear();
        self.progress.reset();
    }
}
