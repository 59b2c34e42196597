use anyhow::Result;
use clap::Parser;
use proxy_sieve::{
    dedup, open_sink, spawn_signal_listener, CheckerConfig, Error, ExtractionMode, FetcherConfig,
    OutputFormat, Pipeline, ProgressReporter, ProxyChecker, ProxyFetcher, RunContext, RunOutcome,
    SinkConfig,
};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Harvest free proxy lists and keep the proxies that actually answer
#[derive(Parser)]
#[command(name = "proxy-sieve", version)]
#[command(about = "Harvest free proxy lists and keep the proxies that actually answer")]
struct Cli {
    /// Timeout in seconds for every fetch and probe
    #[arg(short, long, default_value_t = proxy_sieve::proxy::checker::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Maximum number of probes in flight
    #[arg(
        short = 'c',
        long,
        visible_alias = "workers",
        visible_short_alias = 'w',
        default_value_t = proxy_sieve::proxy::checker::DEFAULT_CONCURRENCY
    )]
    concurrency: usize,

    /// Output file for working proxies; prints to stdout as they are found when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append to the output file as proxies are confirmed instead of writing
    /// the latency-sorted list at the end
    #[arg(long)]
    stream: bool,

    /// Proxy list URLs to fetch (replaces the built-in list)
    #[arg(short, long, num_args = 1..)]
    sources: Vec<String>,

    /// File containing proxy list URLs (one URL per line)
    #[arg(short = 'f', long)]
    source_file: Option<PathBuf>,

    /// Candidate extraction: `line` (unscoped entries become http) or
    /// `pattern` (regex scan, unscoped entries fan out to http/socks4/socks5)
    #[arg(short, long, default_value_t = ExtractionMode::Line)]
    mode: ExtractionMode,

    /// Minimum response body size for a probe to count as working
    #[arg(long, default_value_t = proxy_sieve::proxy::checker::MIN_RESPONSE_SIZE)]
    min_body_bytes: usize,

    /// Leave proxies slower than this out of the output
    #[arg(long)]
    max_latency_ms: Option<u64>,

    /// Output format (plain, jsonl)
    #[arg(long, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,

    /// Do not draw the progress line
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    let sources = ProxyFetcher::resolve_sources(&cli.sources, cli.source_file.as_deref()).await?;

    let sink_config = SinkConfig::new()
        .with_output(cli.output.clone())
        .with_stream(cli.stream)
        .with_format(cli.format)
        .with_max_latency(cli.max_latency_ms.map(Duration::from_millis));
    let mut sink = open_sink(&sink_config)?;

    let checker = ProxyChecker::with_config(
        CheckerConfig::new()
            .with_timeout(timeout)
            .with_concurrency(cli.concurrency)
            .with_min_body_bytes(cli.min_body_bytes),
    );
    checker.validate()?;

    let progress = ProgressReporter::new(!cli.quiet && io::stderr().is_terminal());
    let ctx = RunContext::new(progress);
    let listener = spawn_signal_listener(ctx.cancel_token());

    let fetcher = ProxyFetcher::with_config(
        FetcherConfig::new()
            .with_timeout(timeout)
            .with_mode(cli.mode),
    )?;
    info!(sources = sources.len(), mode = %fetcher.mode(), "fetching proxy lists");
    let Some(reports) = fetcher.fetch_all_until(&sources, &ctx.cancel_token()).await else {
        info!("interrupted while fetching sources, nothing to save");
        return Ok(ExitCode::SUCCESS);
    };
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed == reports.len() {
        warn!("every proxy source failed");
    }

    let candidates = dedup(ProxyFetcher::collect_candidates(reports));
    info!(unique = candidates.len(), "collected candidates");
    if candidates.is_empty() {
        return Err(Error::NoCandidates.into());
    }

    info!(
        timeout_secs = cli.timeout,
        "press Ctrl+C to save and exit early"
    );
    let pipeline = Pipeline::new(checker, ctx.clone());
    let summary = pipeline
        .run(candidates.into_iter().collect(), sink.as_mut())
        .await?;

    ctx.cancel();
    let _ = listener.await;

    let destination = cli
        .output
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    match summary.outcome {
        RunOutcome::Completed => info!(
            working = summary.working,
            written = summary.written,
            to = %destination,
            "verification complete"
        ),
        RunOutcome::Interrupted => info!(
            checked = summary.checked,
            total = summary.total,
            written = summary.written,
            to = %destination,
            "interrupted, saved partial results"
        ),
    }

    Ok(ExitCode::SUCCESS)
}
