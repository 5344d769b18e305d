//! Configuration for a synchronization run.
//!
//! All behaviour is controlled through [`SyncConfig`], built via its
//! [`SyncConfigBuilder`]. Keeping every knob in one immutable struct — the
//! service URLs, the spatial extent, the archive paths, the concurrency
//! ceiling — means no component reads ambient module state, and two runs can
//! be diffed by diffing their configs.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on the
//! production defaults (the Vernonia deployment) for the rest.

use crate::error::SyncError;
use crate::extent::SpatialExtent;
use crate::progress::SyncProgressCallback;
use crate::service::{FeatureService, SurveyHost};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default feature-service layer queried for survey records.
pub const DEFAULT_SERVICE_URL: &str =
    "https://gis.columbiacountymaps.com/server/rest/services/BaseData/Survey_Research/FeatureServer/0";

/// Default base URL the image files are fetched from and published under.
pub const DEFAULT_SURVEY_URL: &str = "https://gis.columbiacountymaps.com/Surveys/";

/// Configuration for a synchronization run.
///
/// Built via [`SyncConfig::builder()`] or [`SyncConfig::default()`].
///
/// # Example
/// ```rust
/// use survey_sync::SyncConfig;
///
/// let config = SyncConfig::builder()
///     .archive_dir("surveys")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SyncConfig {
    /// Feature-service layer URL. Queries go to `{service_url}/query`.
    pub service_url: String,

    /// Base URL for the image files; a record's fetch URL and its published
    /// `SurveyUrl` are both built from this prefix.
    pub survey_base_url: String,

    /// Directory the documents are archived in, flat, one file per record.
    pub archive_dir: PathBuf,

    /// Path of the GeoJSON snapshot, fully overwritten each run.
    pub snapshot_path: PathBuf,

    /// Polygon every query is filtered against.
    pub extent: SpatialExtent,

    /// Maximum simultaneous record pipelines. Default: 8.
    ///
    /// Each missing record costs one download plus one conversion; the
    /// ceiling keeps a first run against an empty archive from opening a
    /// connection per record at once.
    pub concurrency: usize,

    /// HTTP timeout for queries and downloads, in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Program invoked to convert tiff sources. Default: `tiff2pdf`.
    ///
    /// Resolved through `PATH` unless an absolute path is given.
    pub tiff2pdf_program: PathBuf,

    /// Pre-constructed feature service. Takes precedence over `service_url`.
    pub service: Option<Arc<dyn FeatureService>>,

    /// Pre-constructed file host. Takes precedence over `survey_base_url`
    /// for fetching (the published URL still uses `survey_base_url`).
    pub host: Option<Arc<dyn SurveyHost>>,

    /// Optional per-record progress events.
    pub progress_callback: Option<Arc<dyn SyncProgressCallback>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            survey_base_url: DEFAULT_SURVEY_URL.to_string(),
            archive_dir: PathBuf::from("surveys"),
            snapshot_path: PathBuf::from("surveys.geojson"),
            extent: SpatialExtent::vernonia(),
            concurrency: 8,
            request_timeout_secs: 120,
            tiff2pdf_program: PathBuf::from("tiff2pdf"),
            service: None,
            host: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("service_url", &self.service_url)
            .field("survey_base_url", &self.survey_base_url)
            .field("archive_dir", &self.archive_dir)
            .field("snapshot_path", &self.snapshot_path)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("tiff2pdf_program", &self.tiff2pdf_program)
            .field("service", &self.service.as_ref().map(|_| "<dyn FeatureService>"))
            .field("host", &self.host.as_ref().map(|_| "<dyn SurveyHost>"))
            .finish()
    }
}

impl SyncConfig {
    /// Create a new builder for `SyncConfig`.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SyncConfig`].
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn survey_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.survey_base_url = url.into();
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = dir.into();
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    pub fn extent(mut self, extent: SpatialExtent) -> Self {
        self.config.extent = extent;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn tiff2pdf_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.tiff2pdf_program = program.into();
        self
    }

    pub fn service(mut self, service: Arc<dyn FeatureService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn host(mut self, host: Arc<dyn SurveyHost>) -> Self {
        self.config.host = Some(host);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn SyncProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SyncConfig, SyncError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(SyncError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if let Err(reason) = c.extent.validate() {
            return Err(SyncError::InvalidConfig(format!("Spatial extent: {reason}")));
        }
        if c.service_url.is_empty() {
            return Err(SyncError::InvalidConfig("Service URL must not be empty".into()));
        }
        Ok(self.config)
    }
}
