//! news-digest: binary entrypoint.
//! One invocation runs one job (`collect` or `digest`) and exits; an external scheduler
//! (cron, systemd timer, CI) decides when.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::cli::{Cli, Command};
use news_digest::config::{load_settings_default, load_settings_from, Settings};
use news_digest::digest::{self, Dispatch};
use news_digest::ingest::classify::build_classifier;
use news_digest::ingest::providers::build_provider;
use news_digest::ingest::{run_once, CollectOptions};
use news_digest::metrics::Metrics;
use news_digest::notify::{MessageTransport, SmtpTransport, StdoutTransport};
use news_digest::store::{DatasetStore, JsonFileStore};

/// Compact human logs on stderr by default; LOG_FORMAT=json for one JSON object per line.
/// Stdout stays free for the dry-run message.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_digest=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings_default()?,
    };

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let outcome = match cli.command {
        Command::Collect { at } => collect(&mut settings, resolve_now(at)).await,
        Command::Digest { at, dry_run } => send_digest(&mut settings, resolve_now(at), dry_run).await,
    };

    if let (Some(m), Some(path)) = (&metrics, &settings.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            warn!(error = ?e, path = %path.display(), "metrics textfile not written");
        }
    }
    outcome
}

fn resolve_now(at: Option<DateTime<chrono::FixedOffset>>) -> DateTime<Utc> {
    at.map(|t| t.with_timezone(&Utc)).unwrap_or_else(Utc::now)
}

async fn collect(settings: &mut Settings, now: DateTime<Utc>) -> Result<()> {
    settings.resolve_provider_secrets()?;
    let provider = build_provider(&settings.provider)?;
    let store = JsonFileStore::new(&settings.dataset_path);
    let opts = CollectOptions {
        require_mention: settings.collector.require_mention.clone(),
        classifier: build_classifier(&settings.collector.sentiment),
    };

    let report = run_once(
        provider.as_ref(),
        &store,
        &settings.regions,
        &settings.query,
        now,
        &opts,
    )
    .await?;

    for (region, n) in &report.per_region {
        info!(%region, appended = n, "region collected");
    }
    for f in &report.failures {
        warn!(region = %f.region, error = %f.message, "region failed");
    }
    info!(
        provider = provider.name(),
        fetched = report.fetched,
        appended = report.appended,
        duplicates = report.duplicates,
        discarded = report.discarded,
        filtered = report.filtered,
        failed_regions = report.failures.len(),
        dataset = %store.path().display(),
        "collector finished"
    );
    Ok(())
}

async fn send_digest(settings: &mut Settings, now: DateTime<Utc>, dry_run: bool) -> Result<()> {
    let transport: Box<dyn MessageTransport> = if dry_run {
        // Recipients are informational only when printing.
        let _ = settings.resolve_digest_secrets();
        Box::new(StdoutTransport)
    } else {
        settings.resolve_digest_secrets()?;
        Box::new(SmtpTransport::from_settings(&settings.smtp)?)
    };

    let store = JsonFileStore::new(&settings.dataset_path);
    let dataset = store
        .load()
        .await
        .with_context(|| format!("loading dataset {}", store.path().display()))?;

    let report = digest::run(
        now,
        &settings.digest,
        settings.utc_offset,
        &dataset,
        transport.as_ref(),
    )
    .await?;

    let outcome = match report.dispatch {
        Dispatch::Sent => "sent",
        Dispatch::SentEmpty => "sent_empty",
        Dispatch::Skipped => "skipped",
    };
    info!(
        window = %report.window.label,
        transport = transport.name(),
        selected = report.selected,
        dropped = report.dropped,
        outcome,
        "digest finished"
    );
    Ok(())
}
