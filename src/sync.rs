//! Top-level synchronization entry points.
//!
//! A full run has two halves that share the remote query interface but are
//! independent in outcome:
//!
//! * [`reconcile`] mutates the local archive — every record in the extent is
//!   checked and, when its canonical document is missing, fetched and
//!   converted;
//! * [`export_snapshot`] writes the transformed GeoJSON metadata snapshot.
//!
//! [`sync`] runs both. The reconciliation query failing is the single fatal
//! path; everything below it — one record's download, one conversion, even
//! the snapshot query — is caught, logged with record context, and reflected
//! in the returned [`SyncOutcome`] instead of aborting the batch.
//!
//! ## Concurrency
//!
//! Record pipelines fan out through `buffer_unordered(config.concurrency)`:
//! bounded parallelism rather than one task per record at once, and every
//! outcome is awaited and collected before the batch is considered complete.
//! Record pipelines share no mutable state; the only shared resource is the
//! archive directory, addressed by a path unique per record.

use crate::config::SyncConfig;
use crate::error::{RecordError, SyncError};
use crate::pipeline::{exists, fetch, transform};
use crate::service::{
    FeatureService, HttpSurveyHost, RestFeatureService, SurveyHost,
};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

// ── Outcome types ────────────────────────────────────────────────────────

/// Terminal state of one record's pipeline.
///
/// `Unchecked → Exists`, or `Unchecked → Missing → Fetching → Converted /
/// Failed`. Nothing retries a `Failed` record within a run; the next run
/// picks it up because its document is still missing.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// The canonical document was already archived; no fetch was issued.
    Exists,
    /// Fetched, converted, and archived this run.
    Converted,
    /// The pipeline failed at the recorded stage.
    Failed(RecordError),
}

impl RecordOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RecordOutcome::Failed(_))
    }
}

/// One record's name and where its pipeline ended.
#[derive(Debug, Clone)]
pub struct RecordReport {
    pub name: String,
    pub outcome: RecordOutcome,
}

/// Aggregate counters and timings for a run.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Records returned by the identifier query.
    pub total_records: usize,
    /// Records whose document was already archived.
    pub existing: usize,
    /// Records fetched and converted this run.
    pub converted: usize,
    /// Records that ended in a failure outcome.
    pub failed: usize,
    pub reconcile_duration_ms: u64,
    pub snapshot_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a snapshot export.
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub path: PathBuf,
    pub feature_count: usize,
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub stats: SyncStats,
    pub records: Vec<RecordReport>,
    /// `None` when the snapshot query or write failed (logged, non-fatal).
    pub snapshot: Option<SnapshotStats>,
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Run a full synchronization: reconcile the archive, then export the
/// metadata snapshot.
///
/// # Errors
/// Returns `Err` only for fatal conditions: the reconciliation query failed,
/// the configuration is unusable, or the archive directory cannot exist.
/// Per-record failures and a failed snapshot export are reported inside the
/// returned [`SyncOutcome`].
pub async fn sync(config: &SyncConfig) -> Result<SyncOutcome, SyncError> {
    let total_start = Instant::now();
    let service = resolve_service(config)?;
    let host = resolve_host(config)?;

    tokio::fs::create_dir_all(&config.archive_dir)
        .await
        .map_err(|e| {
            SyncError::Internal(format!(
                "create archive dir '{}': {e}",
                config.archive_dir.display()
            ))
        })?;

    // ── Reconcile ────────────────────────────────────────────────────────
    let names = service.query_image_names(&config.extent).await?;
    info!("{} results", names.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_reconcile_start(names.len());
    }

    let reconcile_start = Instant::now();
    let records = reconcile_names(&names, config, host.as_ref()).await;
    let reconcile_duration_ms = reconcile_start.elapsed().as_millis() as u64;

    let failed = records.iter().filter(|r| r.outcome.is_failure()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_reconcile_complete(records.len(), failed);
    }

    // ── Snapshot ─────────────────────────────────────────────────────────
    let snapshot_start = Instant::now();
    let snapshot = match export_snapshot(config).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            // The archive half already ran to completion, and no partial
            // snapshot file exists; a prior snapshot (if any) still stands.
            error!("snapshot export failed: {e}");
            None
        }
    };
    let snapshot_duration_ms = snapshot_start.elapsed().as_millis() as u64;

    let stats = SyncStats {
        total_records: records.len(),
        existing: records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Exists))
            .count(),
        converted: records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Converted))
            .count(),
        failed,
        reconcile_duration_ms,
        snapshot_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "sync complete: {} existing, {} converted, {} failed, {}ms total",
        stats.existing, stats.converted, stats.failed, stats.total_duration_ms
    );

    Ok(SyncOutcome {
        stats,
        records,
        snapshot,
    })
}

/// Reconcile the archive against the remote record set, without exporting a
/// snapshot.
pub async fn reconcile(config: &SyncConfig) -> Result<Vec<RecordReport>, SyncError> {
    let service = resolve_service(config)?;
    let host = resolve_host(config)?;

    tokio::fs::create_dir_all(&config.archive_dir)
        .await
        .map_err(|e| {
            SyncError::Internal(format!(
                "create archive dir '{}': {e}",
                config.archive_dir.display()
            ))
        })?;

    let names = service.query_image_names(&config.extent).await?;
    info!("{} results", names.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_reconcile_start(names.len());
    }
    let records = reconcile_names(&names, config, host.as_ref()).await;
    if let Some(ref cb) = config.progress_callback {
        let failed = records.iter().filter(|r| r.outcome.is_failure()).count();
        cb.on_reconcile_complete(records.len(), failed);
    }
    Ok(records)
}

/// Query the full record set and write the transformed GeoJSON snapshot.
///
/// A query failure aborts the export before anything touches the snapshot
/// path, so a stale-but-complete prior snapshot is never replaced by a
/// partial one.
pub async fn export_snapshot(config: &SyncConfig) -> Result<SnapshotStats, SyncError> {
    let service = resolve_service(config)?;

    let mut collection = service.query_full(&config.extent).await?;
    transform::transform_collection(&mut collection, &config.survey_base_url);
    transform::write_snapshot(&config.snapshot_path, &collection).await?;

    info!(
        "snapshot written: {} features → {}",
        collection.features.len(),
        config.snapshot_path.display()
    );
    Ok(SnapshotStats {
        path: config.snapshot_path.clone(),
        feature_count: collection.features.len(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Fan the record pipelines out with bounded concurrency and collect every
/// terminal outcome.
async fn reconcile_names(
    names: &[String],
    config: &SyncConfig,
    host: &dyn SurveyHost,
) -> Vec<RecordReport> {
    stream::iter(names.iter().map(|name| async move {
        let outcome = reconcile_record(name, config, host).await;
        if let Some(ref cb) = config.progress_callback {
            cb.on_record_done(name, &outcome);
        }
        RecordReport {
            name: name.clone(),
            outcome,
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// One record's state machine: existence check, then (conditionally) fetch
/// and convert. Every failure is terminal for this run.
async fn reconcile_record(
    name: &str,
    config: &SyncConfig,
    host: &dyn SurveyHost,
) -> RecordOutcome {
    match exists::document_exists(&config.archive_dir, name).await {
        Ok(true) => RecordOutcome::Exists,
        Ok(false) => {
            match fetch::fetch_record(name, &config.archive_dir, &config.tiff2pdf_program, host)
                .await
            {
                Ok(()) => RecordOutcome::Converted,
                Err(e) => {
                    warn!("{name}: {e}");
                    RecordOutcome::Failed(e)
                }
            }
        }
        // The probe itself failed: take no action for this record. It stays
        // missing, so the next run retries the whole pipeline.
        Err(e) => {
            warn!("{name}: {e}");
            RecordOutcome::Failed(e)
        }
    }
}

fn resolve_service(config: &SyncConfig) -> Result<Arc<dyn FeatureService>, SyncError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }
    Ok(Arc::new(RestFeatureService::new(
        config.service_url.clone(),
        config.request_timeout_secs,
    )?))
}

fn resolve_host(config: &SyncConfig) -> Result<Arc<dyn SurveyHost>, SyncError> {
    if let Some(ref host) = config.host {
        return Ok(Arc::clone(host));
    }
    Ok(Arc::new(HttpSurveyHost::new(
        config.survey_base_url.clone(),
        config.request_timeout_secs,
    )?))
}
