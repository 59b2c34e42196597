//! Proxy fetcher module for downloading candidate lists
//!
//! Every source is fetched independently: a source that times out, errors
//! or answers with anything but 200 contributes nothing and is logged, while
//! the others carry on.

use crate::proxy::models::Proxy;
use crate::proxy::parser::{ExtractionMode, ProxyParser};
use crate::{Error, Result};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Raw-text proxy lists used when no sources are given
pub const DEFAULT_SOURCES: [&str; 4] = [
    "https://raw.githubusercontent.com/proxifly/free-proxy-list/main/proxies/all/data.txt",
    "https://raw.githubusercontent.com/monosans/proxy-list/main/proxies/all.txt",
    "https://raw.githubusercontent.com/officialputuid/KangProxy/KangProxy/xResults/RAW.txt",
    "https://raw.githubusercontent.com/dpangestuw/Free-Proxy/main/All_proxies.txt",
];

/// Result of fetching a single source
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// The source that was fetched
    pub source: String,
    /// Candidates extracted from the source
    pub proxies: Vec<Proxy>,
    /// Error message if fetching failed
    pub error: Option<String>,
}

impl FetchReport {
    pub fn success(source: String, proxies: Vec<Proxy>) -> Self {
        Self {
            source,
            proxies,
            error: None,
        }
    }

    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            proxies: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for the proxy fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// How candidates are extracted from a body
    pub mode: ExtractionMode,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment
    pub system_proxy: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mode: ExtractionMode::default(),
            system_proxy: true,
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_system_proxy(mut self, system_proxy: bool) -> Self {
        self.system_proxy = system_proxy;
        self
    }
}

/// Proxy fetcher sharing one HTTP client across all sources
pub struct ProxyFetcher {
    config: FetcherConfig,
    client: Client,
}

impl ProxyFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self { config, client })
    }

    pub fn mode(&self) -> ExtractionMode {
        self.config.mode
    }

    /// Work out which sources to fetch.
    ///
    /// URLs from the command line and from `source_file` are combined. With
    /// neither, the built-in [`DEFAULT_SOURCES`] are used. A source file that
    /// cannot be read, or that lists nothing, is a configuration failure.
    pub async fn resolve_sources(
        cli_sources: &[String],
        source_file: Option<&Path>,
    ) -> Result<Vec<String>> {
        let mut sources: Vec<String> = cli_sources
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(path) = source_file {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Config(format!("cannot read source file {}: {}", path.display(), e))
            })?;
            let from_file = ProxyParser::parse_source_list(&content);
            if from_file.is_empty() {
                return Err(Error::NoSources);
            }
            info!(path = %path.display(), count = from_file.len(), "loaded source URLs");
            sources.extend(from_file);
        }

        if sources.is_empty() && source_file.is_none() {
            sources = DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect();
        }

        if sources.is_empty() {
            return Err(Error::NoSources);
        }

        Ok(sources)
    }

    /// Fetch and extract candidates from a single URL
    pub async fn fetch_source(&self, url: &str) -> Result<Vec<Proxy>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Status(status));
        }
        let content = response.text().await?;
        Ok(ProxyParser::extract(&content, self.config.mode))
    }

    /// Fetch one source, folding any failure into the report
    pub async fn fetch_report(&self, url: &str) -> FetchReport {
        match self.fetch_source(url).await {
            Ok(proxies) => {
                info!(source = %url, count = proxies.len(), "fetched candidates");
                FetchReport::success(url.to_string(), proxies)
            }
            Err(e) => {
                warn!(source = %url, error = %e, "source fetch failed");
                FetchReport::failure(url.to_string(), e.to_string())
            }
        }
    }

    /// Fetch all sources concurrently, one report per source in input order
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchReport> {
        join_all(urls.iter().map(|url| self.fetch_report(url))).await
    }

    /// Like [`fetch_all`](Self::fetch_all), but gives up as soon as `cancel`
    /// fires. `None` means the fetch was interrupted.
    pub async fn fetch_all_until(
        &self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Option<Vec<FetchReport>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            reports = self.fetch_all(urls) => Some(reports),
        }
    }

    /// Concatenate the candidates of every report
    pub fn collect_candidates(reports: Vec<FetchReport>) -> Vec<Proxy> {
        reports.into_iter().flat_map(|r| r.proxies).collect()
    }
}
