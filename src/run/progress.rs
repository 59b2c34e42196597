//! Live progress line

use crate::run::context::ProgressSnapshot;
use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum time between two redraws
const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Whether a redraw is due. The final update always renders.
pub fn should_render(
    last_render: Option<Instant>,
    now: Instant,
    snapshot: &ProgressSnapshot,
    interval: Duration,
) -> bool {
    if snapshot.is_final() {
        return true;
    }
    match last_render {
        Some(last) => now.saturating_duration_since(last) >= interval,
        None => true,
    }
}

/// Format the progress line
pub fn render_line(snapshot: &ProgressSnapshot) -> String {
    let percentage = if snapshot.total > 0 {
        snapshot.checked as f64 / snapshot.total as f64 * 100.0
    } else {
        100.0
    };
    format!(
        "[*] Progress: {}/{} ({:.1}%) | Working: {} | Remaining: {} ",
        snapshot.checked,
        snapshot.total,
        percentage,
        snapshot.working,
        snapshot.remaining()
    )
}

#[derive(Debug, Default)]
struct RenderState {
    last_render: Option<Instant>,
    drawn: bool,
}

/// Rate-limited progress line on stderr, redrawn in place
#[derive(Debug)]
pub struct ProgressReporter {
    enabled: bool,
    interval: Duration,
    state: Mutex<RenderState>,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            interval: RENDER_INTERVAL,
            state: Mutex::new(RenderState::default()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Called after every finished probe
    pub fn observe(&self, snapshot: ProgressSnapshot) {
        if !self.enabled {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let now = Instant::now();
        if !should_render(state.last_render, now, &snapshot, self.interval) {
            return;
        }
        state.last_render = Some(now);
        state.drawn = true;

        let mut stderr = io::stderr();
        let _ = execute!(
            stderr,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(render_line(&snapshot))
        );
    }

    /// End the progress line so later output starts on a fresh line
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            if state.drawn {
                let mut stderr = io::stderr();
                let _ = writeln!(stderr);
                state.drawn = false;
            }
        }
    }

    pub(crate) fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = RenderState::default();
        }
    }
}
