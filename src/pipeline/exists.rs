//! Existence check: does a record's canonical document already sit in the
//! archive?
//!
//! Existence alone gates re-fetch. There is no content hash and no
//! modification-time comparison; a document, once converted, is never
//! updated in place.

use crate::error::RecordError;
use crate::pipeline::normalize;
use std::path::{Path, PathBuf};

/// Canonical archive path for a record's converted document.
pub fn document_path(archive_dir: &Path, name: &str) -> PathBuf {
    archive_dir.join(normalize::document_name(name))
}

/// Archive path for a record's source image, pre-conversion.
pub fn source_path(archive_dir: &Path, name: &str) -> PathBuf {
    archive_dir.join(name)
}

/// Probe the archive for the record's canonical document.
///
/// A probe failure (permissions, unreadable directory) is reported as
/// [`RecordError::ExistsCheck`]; the caller skips the record for this run
/// rather than guessing at present-or-missing, and the next run retries.
pub async fn document_exists(archive_dir: &Path, name: &str) -> Result<bool, RecordError> {
    let path = document_path(archive_dir, name);
    tokio::fs::try_exists(&path)
        .await
        .map_err(|e| RecordError::ExistsCheck {
            path,
            reason: e.to_string(),
        })
}
