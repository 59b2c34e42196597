//! Result sinks for working proxies
//!
//! Two shapes of output:
//! - batch: nothing is written until the run ends, then the whole working
//!   set goes out sorted fastest first, replacing the target atomically;
//! - streaming: each proxy is written and flushed the moment it is confirmed.

use crate::proxy::models::WorkingProxy;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Line format of written proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `scheme://host:port`
    #[default]
    Plain,
    /// One JSON object per line
    Jsonl,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "txt" => Ok(OutputFormat::Plain),
            "jsonl" | "json" => Ok(OutputFormat::Jsonl),
            other => Err(format!("Invalid output format: {other}. Use: plain, jsonl")),
        }
    }
}

#[derive(Serialize)]
struct JsonRecord {
    proxy: String,
    latency_ms: u64,
    checked_at: DateTime<Utc>,
}

/// Render one output line, without the trailing newline
pub fn format_entry(proxy: &WorkingProxy, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Plain => Ok(proxy.proxy.url()),
        OutputFormat::Jsonl => Ok(serde_json::to_string(&JsonRecord {
            proxy: proxy.proxy.url(),
            latency_ms: proxy.latency_ms(),
            checked_at: proxy.confirmed_at,
        })?),
    }
}

/// Configuration for the result sink
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    /// Output file; `None` streams to stdout
    pub output: Option<PathBuf>,
    /// Append to the output file as proxies are confirmed
    pub stream: bool,
    pub format: OutputFormat,
    /// Leave out proxies slower than this
    pub max_latency: Option<Duration>,
}

impl SinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_latency(mut self, max_latency: Option<Duration>) -> Self {
        self.max_latency = max_latency;
        self
    }

    fn admits(&self, proxy: &WorkingProxy) -> bool {
        self.max_latency.map_or(true, |limit| proxy.latency <= limit)
    }
}

/// Destination for working proxies
pub trait ResultSink: Send {
    /// Called once per proxy, as soon as it is confirmed working
    fn accept(&mut self, proxy: &WorkingProxy) -> Result<()>;

    /// Called once at the end of the run, completed or interrupted, with the
    /// full working set. Returns how many entries the sink holds in total.
    fn flush(&mut self, working: &[WorkingProxy]) -> Result<usize>;
}

/// Writes the sorted working set to a file in one go
pub struct BatchFileSink {
    path: PathBuf,
    config: SinkConfig,
}

impl BatchFileSink {
    /// Check that the target can be written before any work is done
    pub fn open(path: &Path, config: SinkConfig) -> Result<Self> {
        if path.is_dir() {
            return Err(Error::Config(format!("output path {} is a directory", path.display())));
        }
        let dir = parent_dir(path);
        NamedTempFile::new_in(dir).map_err(|e| {
            Error::Config(format!("output path {} is not writable: {}", path.display(), e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }
}

impl ResultSink for BatchFileSink {
    fn accept(&mut self, _proxy: &WorkingProxy) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self, working: &[WorkingProxy]) -> Result<usize> {
        let mut entries: Vec<&WorkingProxy> =
            working.iter().filter(|p| self.config.admits(p)).collect();
        entries.sort_by_key(|p| p.latency);

        let mut file = NamedTempFile::new_in(parent_dir(&self.path))?;
        for entry in &entries {
            writeln!(file, "{}", format_entry(entry, self.config.format)?)?;
        }
        file.flush()?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        Ok(entries.len())
    }
}

/// Writes each proxy as it arrives
pub struct StreamSink<W: Write + Send> {
    writer: W,
    config: SinkConfig,
    written: usize,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W, config: SinkConfig) -> Self {
        Self {
            writer,
            config,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ResultSink for StreamSink<W> {
    fn accept(&mut self, proxy: &WorkingProxy) -> Result<()> {
        if !self.config.admits(proxy) {
            return Ok(());
        }
        writeln!(self.writer, "{}", format_entry(proxy, self.config.format)?)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self, _working: &[WorkingProxy]) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// Build the sink described by `config`, failing early on unusable paths
pub fn open_sink(config: &SinkConfig) -> Result<Box<dyn ResultSink>> {
    match (&config.output, config.stream) {
        (None, _) => Ok(Box::new(StreamSink::new(io::stdout(), config.clone()))),
        (Some(path), true) => {
            let file = File::create(path).map_err(|e| {
                Error::Config(format!("cannot open output {}: {}", path.display(), e))
            })?;
            Ok(Box::new(StreamSink::new(file, config.clone())))
        }
        (Some(path), false) => Ok(Box::new(BatchFileSink::open(path, config.clone())?)),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{Proxy, ProxyType};
    use std::net::Ipv4Addr;

    fn working(last_octet: u8, ms: u64) -> WorkingProxy {
        WorkingProxy::new(
            Proxy::new(Ipv4Addr::new(10, 0, 0, last_octet), 3128, ProxyType::Http),
            Duration::from_millis(ms),
        )
    }

    #[test]
    fn test_batch_sink_sorts_by_latency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        let mut sink = BatchFileSink::open(&path, SinkConfig::new()).unwrap();

        let set = vec![working(1, 900), working(2, 40), working(3, 250)];
        for proxy in &set {
            sink.accept(proxy).unwrap();
        }
        assert!(!path.exists());

        let written = sink.flush(&set).unwrap();
        assert_eq!(written, 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "http://10.0.0.2:3128\nhttp://10.0.0.3:3128\nhttp://10.0.0.1:3128\n"
        );
    }

    #[test]
    fn test_batch_sink_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();

        let mut sink = BatchFileSink::open(&path, SinkConfig::new()).unwrap();
        sink.flush(&[working(7, 10)]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://10.0.0.7:3128\n");
    }

    #[test]
    fn test_batch_sink_rejects_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BatchFileSink::open(dir.path(), SinkConfig::new()),
            Err(Error::Config(_))
        ));

        let missing = dir.path().join("no/such/dir/out.txt");
        assert!(matches!(
            BatchFileSink::open(&missing, SinkConfig::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stream_sink_writes_as_confirmed() {
        let mut sink = StreamSink::new(Vec::new(), SinkConfig::new());
        sink.accept(&working(5, 500)).unwrap();
        sink.accept(&working(6, 5)).unwrap();
        assert_eq!(sink.flush(&[]).unwrap(), 2);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "http://10.0.0.5:3128\nhttp://10.0.0.6:3128\n");
    }

    #[test]
    fn test_max_latency_filter() {
        let config = SinkConfig::new().with_max_latency(Some(Duration::from_millis(100)));
        let mut sink = StreamSink::new(Vec::new(), config.clone());
        sink.accept(&working(1, 100)).unwrap();
        sink.accept(&working(2, 101)).unwrap();
        assert_eq!(sink.written(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.txt");
        let mut batch = BatchFileSink::open(&path, config).unwrap();
        assert_eq!(batch.flush(&[working(1, 500), working(2, 50)]).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://10.0.0.2:3128\n");
    }

    #[test]
    fn test_jsonl_format() {
        let line = format_entry(&working(9, 123), OutputFormat::Jsonl).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["proxy"], "http://10.0.0.9:3128");
        assert_eq!(value["latency_ms"], 123);
        assert!(value["checked_at"].is_string());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSONL".parse::<OutputFormat>(), Ok(OutputFormat::Jsonl));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Plain));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_open_sink_stream_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.txt");
        std::fs::write(&path, "old\n").unwrap();

        let config = SinkConfig::new().with_output(Some(path.clone())).with_stream(true);
        let mut sink = open_sink(&config).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        sink.accept(&working(4, 30)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://10.0.0.4:3128\n");
        assert_eq!(sink.flush(&[]).unwrap(), 1);
    }
}
