//! Fetching: pull a record's image from the survey host into the archive.
//!
//! The payload is written atomically (temp file + rename) under the record's
//! ORIGINAL filename; conversion renames it into canonical form afterwards.
//! Ordering matters:
//!
//! * a failed fetch never reaches the write stage, so no partial file ever
//!   appears in the archive;
//! * a failed write never reaches the converter, so the external tool is
//!   never pointed at a missing or truncated source.

use crate::error::RecordError;
use crate::pipeline::{convert, exists};
use crate::service::SurveyHost;
use std::path::Path;
use tracing::debug;

/// Download one record's image and convert it into the canonical document.
///
/// On success the archive contains the converted document and the source is
/// gone. On any failure the error describes the stage that failed and the
/// archive holds at most the (intact) source file.
pub async fn fetch_record(
    name: &str,
    archive_dir: &Path,
    tiff2pdf_program: &Path,
    host: &dyn SurveyHost,
) -> Result<(), RecordError> {
    let bytes = host.fetch(name).await?;
    debug!("downloaded {name}: {} bytes", bytes.len());

    let source = exists::source_path(archive_dir, name);
    write_atomic(&source, &bytes).await?;

    let dest = exists::document_path(archive_dir, name);
    convert::convert_to_document(&source, &dest, tiff2pdf_program).await
}

/// Write the full payload under a temp name, then rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RecordError> {
    let write_err = |reason: String| RecordError::Write {
        path: path.to_path_buf(),
        reason,
    };

    // Appended, not substituted: `s1.tif` and `s1.jpg` must not share a
    // temp name while their pipelines run concurrently.
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = std::path::PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_err(format!("rename: {e}")))
}
