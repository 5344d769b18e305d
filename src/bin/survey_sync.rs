//! CLI binary for survey-sync.
//!
//! A thin shim over the library crate that maps CLI flags to `SyncConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use survey_sync::{
    export_snapshot, reconcile, sync, RecordOutcome, SyncConfig, SyncProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the record set, a log line per
/// settled record. Records settle out of order (bounded-concurrent mode), so
/// the bar tracks counts, not positions.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_reconcile_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Querying");
        bar.set_message("Contacting feature service…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl SyncProgressCallback for CliProgressCallback {
    fn on_reconcile_start(&self, total_records: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} records  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_records as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reconciling");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_records} records in extent"))
        ));
    }

    fn on_record_done(&self, name: &str, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Exists => {}
            RecordOutcome::Converted => {
                self.bar
                    .println(format!("  {} {}", green("✓"), dim(name)));
            }
            RecordOutcome::Failed(e) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                self.bar.println(format!("  {} {}  {}", red("✗"), name, red(&e.to_string())));
            }
        }
        self.bar.inc(1);
    }

    fn on_reconcile_complete(&self, total_records: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} records reconciled",
                green("✔"),
                bold(&total_records.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} records reconciled  ({} failed)",
                if failed == total_records {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(total_records - failed).to_string()),
                total_records,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: reconcile the archive, then write the snapshot
  survey-sync

  # Archive into another directory, snapshot elsewhere
  survey-sync --archive-dir /srv/surveys -o /srv/www/surveys.geojson

  # Limit simultaneous downloads on a thin uplink
  survey-sync --concurrency 2

  # Only refresh the published metadata, leave the archive alone
  survey-sync --snapshot-only

  # Only fill archive gaps, skip the snapshot
  survey-sync --documents-only

PREREQUISITES:
  tiff sources are converted with the external `tiff2pdf` tool (libtiff).
  Point --tiff2pdf at the binary if it is not on PATH. jpeg sources are
  converted in-process; no tool is needed for them.
"#;

/// Synchronize the survey-document archive and publish the GeoJSON snapshot.
#[derive(Parser, Debug)]
#[command(
    name = "survey-sync",
    version,
    about = "Synchronize a survey-document archive with a remote feature service",
    long_about = "Query survey records intersecting the configured spatial extent, download and \
convert any referenced image that is missing from the local archive (tiff/jpeg → PDF), and \
write a normalized GeoJSON snapshot of the record metadata.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Feature-service layer URL.
    #[arg(long, env = "SURVEY_SYNC_SERVICE_URL", default_value = survey_sync::DEFAULT_SERVICE_URL)]
    service_url: String,

    /// Base URL of the survey file host (also the published URL prefix).
    #[arg(long, env = "SURVEY_SYNC_SURVEY_URL", default_value = survey_sync::DEFAULT_SURVEY_URL)]
    survey_url: String,

    /// Directory the converted documents are archived in.
    #[arg(long, env = "SURVEY_SYNC_ARCHIVE_DIR", default_value = "surveys")]
    archive_dir: PathBuf,

    /// Write the GeoJSON snapshot to this path.
    #[arg(short, long, env = "SURVEY_SYNC_OUTPUT", default_value = "surveys.geojson")]
    output: PathBuf,

    /// Maximum simultaneous record pipelines.
    #[arg(short, long, env = "SURVEY_SYNC_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// HTTP timeout in seconds for queries and downloads.
    #[arg(long, env = "SURVEY_SYNC_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Program used to convert tiff sources.
    #[arg(long, env = "SURVEY_SYNC_TIFF2PDF", default_value = "tiff2pdf")]
    tiff2pdf: PathBuf,

    /// Reconcile the archive only; skip the snapshot export.
    #[arg(long, conflicts_with = "snapshot_only")]
    documents_only: bool,

    /// Export the snapshot only; skip archive reconciliation.
    #[arg(long)]
    snapshot_only: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SURVEY_SYNC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SURVEY_SYNC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SURVEY_SYNC_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = SyncConfig::builder()
        .service_url(&cli.service_url)
        .survey_base_url(&cli.survey_url)
        .archive_dir(&cli.archive_dir)
        .snapshot_path(&cli.output)
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout)
        .tiff2pdf_program(&cli.tiff2pdf);

    if show_progress && !cli.snapshot_only {
        builder = builder.progress_callback(CliProgressCallback::new());
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    if cli.snapshot_only {
        let stats = export_snapshot(&config)
            .await
            .context("Snapshot export failed")?;
        if !cli.quiet {
            eprintln!(
                "{} {} features  →  {}",
                green("✔"),
                bold(&stats.feature_count.to_string()),
                bold(&stats.path.display().to_string()),
            );
        }
        return Ok(());
    }

    if cli.documents_only {
        let records = reconcile(&config).await.context("Reconciliation failed")?;
        let failed = records.iter().filter(|r| r.outcome.is_failure()).count();
        if failed > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let outcome = sync(&config).await.context("Sync failed")?;

    if !cli.quiet {
        let s = &outcome.stats;
        eprintln!(
            "{}  {} existing  {} converted  {} failed  {}ms",
            if s.failed == 0 { green("✔") } else { cyan("⚠") },
            dim(&s.existing.to_string()),
            bold(&s.converted.to_string()),
            if s.failed == 0 {
                dim("0")
            } else {
                red(&s.failed.to_string())
            },
            s.total_duration_ms,
        );
        match &outcome.snapshot {
            Some(snap) => eprintln!(
                "   {} features  →  {}",
                dim(&snap.feature_count.to_string()),
                bold(&snap.path.display().to_string()),
            ),
            None => eprintln!("   {} snapshot not written (see log)", red("✗")),
        }
    }

    if outcome.stats.failed > 0 || outcome.snapshot.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
