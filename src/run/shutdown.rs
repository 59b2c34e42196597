//! Interrupt handling
//!
//! The listener only flips the run's cancellation token. Flushing results
//! and choosing the exit path is left to the pipeline supervisor and `main`.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancel `token` on Ctrl-C, or SIGINT/SIGTERM on Unix.
///
/// On Unix the handlers are registered before this returns, so a signal
/// that arrives before the listener task first runs is still caught.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    let signals = ShutdownSignals::install();
    tokio::spawn(async move {
        tokio::select! {
            _ = signals.recv() => {
                warn!("received shutdown signal, saving collected proxies");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Self {
        Self {
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
        }
    }

    async fn recv(self) {
        tokio::select! {
            _ = next(self.interrupt) => {}
            _ = next(self.terminate) => {}
        }
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            warn!(signal = name, error = %e, "cannot listen for signal");
            None
        }
    }
}

#[cfg(unix)]
async fn next(signal: Option<Signal>) {
    match signal {
        Some(mut signal) => {
            signal.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Self {
        Self
    }

    async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
