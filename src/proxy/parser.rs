//! Candidate extraction from raw source text

use crate::proxy::models::{Proxy, ProxyType};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A whole line holding one `[scheme://]ip:port` entry
static LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9]*)://)?(\d{1,3}(?:\.\d{1,3}){3}):(\d{1,5})/?$")
        .expect("Invalid line regex")
});

/// `[scheme://]ip:port` occurrences anywhere in a body
static PATTERN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(https?|socks[45])://)?(\d{1,3}(?:\.\d{1,3}){3}):(\d{1,5})\b")
        .expect("Invalid pattern regex")
});

/// How candidates are pulled out of a fetched body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// One candidate per line; unscoped entries default to `http`.
    #[default]
    Line,
    /// Regex scan of the whole body; unscoped entries fan out to every
    /// scheme in [`ProxyType::FAN_OUT`].
    Pattern,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Line => write!(f, "line"),
            ExtractionMode::Pattern => write!(f, "pattern"),
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(ExtractionMode::Line),
            "pattern" => Ok(ExtractionMode::Pattern),
            other => Err(format!("Invalid extraction mode: {other}. Use: line, pattern")),
        }
    }
}

/// Parser turning raw list text into candidates
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single line in line mode.
    ///
    /// Accepts `ip:port` and `scheme://ip:port`. Blank lines, `#` comments,
    /// unknown schemes, invalid addresses and port 0 yield `None`.
    pub fn parse_line(line: &str) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let caps = LINE_REGEX.captures(line)?;
        let proxy_type = match caps.get(1) {
            Some(scheme) => ProxyType::from_scheme(scheme.as_str())?,
            None => ProxyType::Http,
        };
        let (host, port) = Self::address(&caps)?;

        Some(Proxy::new(host, port, proxy_type))
    }

    /// Scan a whole body for proxies in pattern mode
    pub fn scan_patterns(content: &str) -> Vec<Proxy> {
        let mut proxies = Vec::new();

        for caps in PATTERN_REGEX.captures_iter(content) {
            let Some((host, port)) = Self::address(&caps) else {
                continue;
            };
            match caps.get(1).and_then(|s| ProxyType::from_scheme(s.as_str())) {
                Some(proxy_type) => proxies.push(Proxy::new(host, port, proxy_type)),
                None => proxies.extend(
                    ProxyType::FAN_OUT
                        .iter()
                        .map(|&proxy_type| Proxy::new(host, port, proxy_type)),
                ),
            }
        }

        proxies
    }

    /// Extract candidates from a fetched body using the given policy
    pub fn extract(content: &str, mode: ExtractionMode) -> Vec<Proxy> {
        match mode {
            ExtractionMode::Line => content.lines().filter_map(Self::parse_line).collect(),
            ExtractionMode::Pattern => Self::scan_patterns(content),
        }
    }

    /// Parse a newline-delimited list of source URLs, skipping blanks and comments
    pub fn parse_source_list(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    fn address(caps: &Captures<'_>) -> Option<(Ipv4Addr, u16)> {
        let host: Ipv4Addr = caps.get(2)?.as_str().parse().ok()?;
        let port: u16 = caps.get(3)?.as_str().parse().ok()?;
        if port == 0 {
            return None;
        }
        Some((host, port))
    }
}

/// Merge candidates into a set of unique endpoints.
pub fn dedup<I>(candidates: I) -> HashSet<Proxy>
where
    I: IntoIterator<Item = Proxy>,
{
    candidates.into_iter().collect()
}
