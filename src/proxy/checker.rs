//! Proxy checker module for probing a single candidate

use crate::proxy::models::{Proxy, ProxyCheckResult};
use crate::{Error, Result};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode, Url};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Default timeout for proxy checks in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent checks
pub const DEFAULT_CONCURRENCY: usize = 200;

/// URL every candidate is probed against
pub const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Smallest body a working proxy may return
pub const MIN_RESPONSE_SIZE: usize = 10;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each probe, body included
    pub timeout: Duration,
    /// Number of probes allowed in flight
    pub concurrency: usize,
    /// URL to probe through each proxy
    pub test_url: String,
    /// Minimum response body size in bytes
    pub min_body_bytes: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_TEST_URL.to_string(),
            min_body_bytes: MIN_RESPONSE_SIZE,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_min_body_bytes(mut self, min_body_bytes: usize) -> Self {
        self.min_body_bytes = min_body_bytes;
        self
    }
}

/// Why a probe failed. Only ever logged, never surfaced.
#[derive(Debug, Error)]
enum ProbeFailure {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("client setup aborted: {0}")]
    Setup(#[from] tokio::task::JoinError),
    #[error("HTTP status: {0}")]
    Status(StatusCode),
    #[error("body too short: {0} bytes")]
    ShortBody(usize),
}

/// Proxy checker for validating proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single proxy with exactly one request.
    pub async fn check_proxy(&self, proxy: &Proxy) -> ProxyCheckResult {
        match self.probe(proxy).await {
            Ok(latency) => ProxyCheckResult::working(proxy.clone(), latency),
            Err(e) => {
                debug!(proxy = %proxy, error = %e, "probe failed");
                ProxyCheckResult::failed(proxy.clone())
            }
        }
    }

    async fn probe(&self, proxy: &Proxy) -> std::result::Result<Duration, ProbeFailure> {
        let client = self.create_client(proxy).await?;

        let start = Instant::now();
        let response = client.get(&self.config.test_url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProbeFailure::Status(status));
        }
        let body = response.bytes().await?;
        if body.len() < self.config.min_body_bytes {
            return Err(ProbeFailure::ShortBody(body.len()));
        }

        Ok(start.elapsed())
    }

    /// Create a reqwest client routed through the proxy.
    ///
    /// reqwest binds proxies per client, so each probe gets its own client
    /// with no idle pool; nothing outlives the probe. Building a client is
    /// synchronous work, so it runs on the blocking pool and never stalls
    /// the probes already in flight.
    async fn create_client(&self, proxy: &Proxy) -> std::result::Result<Client, ProbeFailure> {
        let proxy_url = proxy.url();
        let timeout = self.config.timeout;

        let client = tokio::task::spawn_blocking(move || {
            Client::builder()
                .proxy(ReqwestProxy::all(proxy_url)?)
                .timeout(timeout)
                .pool_max_idle_per_host(0)
                .build()
        })
        .await??;

        Ok(client)
    }

    /// Reject settings under which no probe could ever succeed
    pub fn validate(&self) -> Result<()> {
        if self.config.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }

        let url = Url::parse(&self.config.test_url).map_err(|e| {
            Error::Config(format!("invalid test URL {}: {}", self.config.test_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "test URL must be http or https: {}",
                self.config.test_url
            )));
        }

        Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(())
    }
}
