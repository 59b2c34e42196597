//! Proxy module for harvesting and verifying proxies
//!
//! This module provides functionality for:
//! - Fetching proxy lists from remote text sources
//! - Extracting and deduplicating candidate endpoints
//! - Probing a single candidate through a test request

pub mod checker;
pub mod fetcher;
pub mod models;
pub mod parser;

pub use checker::{CheckerConfig, ProxyChecker};
pub use fetcher::{FetchReport, FetcherConfig, ProxyFetcher, DEFAULT_SOURCES};
pub use models::{ProbeOutcome, Proxy, ProxyCheckResult, ProxyType, WorkingProxy};
pub use parser::{dedup, ExtractionMode, ProxyParser};
