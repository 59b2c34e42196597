//! Error types

use thiserror::Error;

/// Errors that reach the process boundary.
///
/// Per-source failures are captured in a `FetchReport` and per-proxy
/// failures only move the run counters; neither is raised past its item.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or unusable configuration (source file, output path, client settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// No source URLs to fetch from.
    #[error("no proxy sources configured")]
    NoSources,

    /// Every source came back empty or failed.
    #[error("no proxy candidates could be obtained from any source")]
    NoCandidates,

    /// A source answered with something other than 200.
    #[error("unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
