//! Proxy Sieve - Proxy Harvester and Verifier
//!
//! Fetches free proxy lists, deduplicates the candidates, probes each one
//! through a bounded worker pool and keeps the proxies that answer.

pub mod error;
pub mod proxy;
pub mod run;

#[cfg(test)]
pub mod test_utils;

pub use error::Error;
pub use proxy::*;
pub use run::*;

/// Application result type
pub type Result<T> = std::result::Result<T, Error>;
