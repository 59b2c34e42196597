//! Run orchestration: shared state, admission control, progress, output
//! and shutdown.

pub mod context;
pub mod pipeline;
pub mod progress;
pub mod shutdown;
pub mod sink;

pub use context::{ProgressSnapshot, RunContext, RunState, WorkingSet};
pub use pipeline::{Pipeline, RunOutcome, RunSummary};
pub use progress::ProgressReporter;
pub use shutdown::spawn_signal_listener;
pub use sink::{open_sink, BatchFileSink, OutputFormat, ResultSink, SinkConfig, StreamSink};
