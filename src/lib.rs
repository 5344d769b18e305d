//! # survey-sync
//!
//! Synchronize a local archive of survey documents with the records exposed
//! by a remote geospatial feature service, and publish a normalized GeoJSON
//! snapshot of the record metadata.
//!
//! ## Why this crate?
//!
//! The county's survey catalog lives behind an Esri feature service; the
//! scanned images it references are tiffs and jpegs on a plain file host.
//! Consumers want neither: they want stable PDF links and a clean metadata
//! schema. This crate reconciles the remote record set against the local
//! archive — downloading and converting only what is missing — and rewrites
//! the raw service attributes into the public shape in one pass.
//!
//! ## Pipeline Overview
//!
//! ```text
//! feature service
//!  │
//!  ├─ 1. Query      image filename of every record in the spatial extent
//!  ├─ 2. Exists     skip records whose canonical PDF is already archived
//!  ├─ 3. Fetch      download missing images (bounded concurrency)
//!  ├─ 4. Convert    tiff → external tiff2pdf, jpeg → in-process embed
//!  └─ 5. Snapshot   full re-query, normalize attributes, write GeoJSON
//! ```
//!
//! Existence alone gates re-fetch: the archive is append-only, a document is
//! never updated in place, and deletions on the remote side are never pruned
//! locally. One record's failure never aborts the batch — failures are
//! logged, recorded in the outcome, and naturally retried next run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use survey_sync::{sync, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::default();
//!     let outcome = sync(&config).await?;
//!     println!(
//!         "{} existing, {} converted, {} failed",
//!         outcome.stats.existing, outcome.stats.converted, outcome.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `survey-sync` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! survey-sync = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extent;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod sync;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SyncConfig, SyncConfigBuilder, DEFAULT_SERVICE_URL, DEFAULT_SURVEY_URL};
pub use error::{RecordError, SyncError};
pub use extent::{SpatialExtent, SpatialReference};
pub use progress::SyncProgressCallback;
pub use service::{FeatureCollection, FeatureService, SurveyFeature, SurveyHost};
pub use sync::{
    export_snapshot, reconcile, sync, RecordOutcome, RecordReport, SnapshotStats, SyncOutcome,
    SyncStats,
};
