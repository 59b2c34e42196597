//! Verification pipeline
//!
//! Candidates are pulled lazily through a bounded pool of probe futures
//! (`buffer_unordered`), so at most `concurrency` probes exist at once no
//! matter how many candidates there are. The supervisor in [`Pipeline::run`]
//! races the pool against the run's cancellation token and always finishes
//! by flushing the working set into the sink.

use crate::proxy::checker::ProxyChecker;
use crate::proxy::models::{Proxy, WorkingProxy};
use crate::run::context::RunContext;
use crate::run::sink::ResultSink;
use crate::Result;
use futures::future;
use futures::stream::{self, StreamExt};
use tracing::info;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every candidate was probed.
    Completed,
    /// Cancelled before the queue drained; partial results were saved.
    Interrupted,
}

/// Final numbers of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub total: usize,
    pub checked: usize,
    pub working: usize,
    /// Probes dropped mid-flight by an interrupt
    pub abandoned: usize,
    /// Entries the sink ended up with
    pub written: usize,
}

/// Scoped bookkeeping for one probe.
///
/// Dropping the guard is the only way a probe leaves the in-flight count,
/// so the counters move exactly once per probe whichever way it ends. A
/// probe that reached a verdict counts as checked and moves the progress
/// line; one whose future was dropped mid-flight only counts as abandoned.
struct ProbeGuard<'a> {
    ctx: &'a RunContext,
    verdict: Option<bool>,
}

impl<'a> ProbeGuard<'a> {
    fn begin(ctx: &'a RunContext) -> Self {
        ctx.state().begin_probe();
        Self { ctx, verdict: None }
    }

    fn settle(&mut self, working: bool) {
        self.verdict = Some(working);
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        match self.verdict {
            Some(working) => {
                self.ctx.state().finish_probe(working);
                self.ctx.progress().observe(self.ctx.state().snapshot());
            }
            None => self.ctx.state().abandon_probe(),
        }
    }
}

/// Runs probes for a candidate set under a concurrency cap
pub struct Pipeline {
    checker: ProxyChecker,
    ctx: RunContext,
}

impl Pipeline {
    pub fn new(checker: ProxyChecker, ctx: RunContext) -> Self {
        Self { checker, ctx }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn concurrency(&self) -> usize {
        self.checker.config().concurrency.max(1)
    }

    /// Probe one candidate and record it if it works
    async fn verify_one(&self, proxy: Proxy) -> Option<WorkingProxy> {
        let mut guard = ProbeGuard::begin(&self.ctx);
        let result = self.checker.check_proxy(&proxy).await;
        let Some(working) = result.into_working() else {
            guard.settle(false);
            return None;
        };
        self.ctx.working_set().push(working.clone());
        guard.settle(true);
        Some(working)
    }

    /// Probe every candidate, handing working proxies to the sink as they
    /// are confirmed. Stops admitting candidates once the run is cancelled.
    pub async fn verify_all(
        &self,
        candidates: Vec<Proxy>,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let ctx = &self.ctx;
        let mut results = stream::iter(candidates)
            .take_while(|_| future::ready(!ctx.is_cancelled()))
            .map(|proxy| self.verify_one(proxy))
            .buffer_unordered(self.concurrency());

        while let Some(result) = results.next().await {
            if let Some(working) = result {
                sink.accept(&working)?;
            }
        }

        Ok(())
    }

    /// Run a full verification pass and flush the results.
    ///
    /// On cancellation the pass is abandoned right away: no further
    /// candidates are admitted, probes still in flight are dropped and
    /// whatever is already in the working set is flushed. The returned
    /// summary says which way the run ended.
    pub async fn run(
        &self,
        candidates: Vec<Proxy>,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary> {
        self.ctx.reset(candidates.len());
        let cancel = self.ctx.cancel_token();

        info!(
            total = candidates.len(),
            concurrency = self.concurrency(),
            "checking candidates"
        );

        let outcome = {
            let verify = self.verify_all(candidates, &mut *sink);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => RunOutcome::Interrupted,
                res = verify => {
                    res?;
                    RunOutcome::Completed
                }
            }
        };

        self.ctx.progress().finish();

        let state = self.ctx.state();
        let written = sink.flush(&self.ctx.working_set().sorted_by_latency())?;
        let summary = RunSummary {
            outcome,
            total: state.total(),
            checked: state.checked(),
            working: state.working(),
            abandoned: state.abandoned(),
            written,
        };

        info!(
            outcome = ?summary.outcome,
            checked = summary.checked,
            total = summary.total,
            working = summary.working,
            abandoned = summary.abandoned,
            written = summary.written,
            "verification finished"
        );

        Ok(summary)
    }
}
