//! Error types for the survey-sync library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SyncError`] — **Fatal**: the run cannot proceed at all (the remote
//!   query failed, the configuration is invalid, the snapshot could not be
//!   written). Returned as `Err(SyncError)` from the top-level entry points.
//!
//! * [`RecordError`] — **Non-fatal**: a single record's pipeline failed
//!   (download, write, conversion, existence probe) but every other record
//!   is fine. Stored inside [`crate::sync::RecordOutcome`] so callers can
//!   inspect partial success rather than losing the whole batch to one bad
//!   record.
//!
//! Nothing here retries. A failed record stays missing from the archive and
//! is naturally picked up again on the next full run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the survey-sync library.
///
/// Record-level failures use [`RecordError`] and are stored in
/// [`crate::sync::RecordOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote feature-service query failed (network, decode, or service
    /// error payload). Aborts the dependent pipeline.
    #[error("Feature query failed against '{url}': {reason}")]
    Query { url: String, reason: String },

    /// The feature service answered with a non-success HTTP status.
    #[error("Feature service returned HTTP {status} for '{url}'")]
    ServiceStatus { url: String, status: u16 },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or replace the snapshot file.
    #[error("Failed to write snapshot '{path}': {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single record's pipeline.
///
/// The reconciliation loop continues past any of these; the failed record is
/// retried on the next run because its canonical document never appeared.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// The byte fetch from the survey file host failed. Nothing was written.
    #[error("Download failed for '{name}': {reason}")]
    Download { name: String, reason: String },

    /// The payload could not be written to the archive. The converter never
    /// ran, so no partial document exists.
    #[error("Write failed for '{path}': {reason}")]
    Write { path: PathBuf, reason: String },

    /// The format conversion failed (external tool exited non-zero, was
    /// unavailable, or the in-process encode errored). The source file is
    /// left in place as a diagnostic artifact.
    #[error("Conversion failed for '{path}': {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// The file's extension matches no supported source format. The record
    /// is a no-op.
    #[error("'{name}' is not a tiff or jpeg file")]
    UnsupportedFormat { name: String },

    /// The existence probe itself errored; the record is skipped this run.
    #[error("Existence check failed for '{path}': {reason}")]
    ExistsCheck { path: PathBuf, reason: String },
}
