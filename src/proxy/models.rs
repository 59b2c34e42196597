//! Proxy data models

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Proxy type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// Schemes an unscoped `ip:port` expands into when fanning out.
    pub const FAN_OUT: [ProxyType; 3] = [ProxyType::Http, ProxyType::Socks4, ProxyType::Socks5];

    /// Map a URL scheme (case-insensitive) to a proxy type.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyType::Http),
            "https" => Some(ProxyType::Https),
            "socks4" => Some(ProxyType::Socks4),
            "socks5" => Some(ProxyType::Socks5),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// A candidate proxy endpoint, `scheme://host:port`.
///
/// Two candidates are the same iff their canonical strings are equal, so the
/// same address under two schemes counts as two candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Proxy {
    pub proxy_type: ProxyType,
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Proxy {
    pub fn new(host: Ipv4Addr, port: u16, proxy_type: ProxyType) -> Self {
        Self {
            proxy_type,
            host,
            port,
        }
    }

    /// Get the proxy URL string
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.proxy_type, self.host, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Outcome of a single probe. Failures are deliberately not classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Working { latency: Duration },
    Failed,
}

/// Result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCheckResult {
    pub proxy: Proxy,
    pub outcome: ProbeOutcome,
}

impl ProxyCheckResult {
    pub fn working(proxy: Proxy, latency: Duration) -> Self {
        Self {
            proxy,
            outcome: ProbeOutcome::Working { latency },
        }
    }

    pub fn failed(proxy: Proxy) -> Self {
        Self {
            proxy,
            outcome: ProbeOutcome::Failed,
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Working { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self.outcome {
            ProbeOutcome::Working { latency } => Some(latency),
            ProbeOutcome::Failed => None,
        }
    }

    /// Convert into a working-set entry, if the probe succeeded.
    pub fn into_working(self) -> Option<WorkingProxy> {
        let latency = self.latency()?;
        Some(WorkingProxy::new(self.proxy, latency))
    }
}

/// A verified proxy and the round-trip time of its probe
#[derive(Debug, Clone)]
pub struct WorkingProxy {
    pub proxy: Proxy,
    pub latency: Duration,
    /// When the probe succeeded
    pub confirmed_at: DateTime<Utc>,
}

impl WorkingProxy {
    pub fn new(proxy: Proxy, latency: Duration) -> Self {
        Self {
            proxy,
            latency,
            confirmed_at: Utc::now(),
        }
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}
