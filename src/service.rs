//! Remote collaborators: the feature-query service and the survey file host.
//!
//! Both are consumed through trait objects so tests (and callers with custom
//! middleware) can inject doubles via
//! [`crate::config::SyncConfigBuilder::service`] /
//! [`crate::config::SyncConfigBuilder::host`]; production runs resolve the
//! reqwest-backed implementations from the configured URLs.
//!
//! The query contract is the Esri REST `query` operation: the extent polygon
//! travels as a JSON `geometry` parameter with
//! `spatialRel=esriSpatialRelIntersects`, and two projections are used —
//! identifier-only (`outFields=SVY_IMAGE`, `f=json`) for reconciliation and
//! full-attribute-with-geometry (`outFields=*`, `f=geojson`) for the
//! snapshot. The service reports its own failures as a JSON `error` body
//! under HTTP 200, so success decoding checks for that shape first.

use crate::error::{RecordError, SyncError};
use crate::extent::SpatialExtent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Attribute that names a record's image file on the survey host.
pub const IMAGE_FIELD: &str = "SVY_IMAGE";

// ── Feature types ────────────────────────────────────────────────────────

/// A GeoJSON feature collection, the shape of the full query response and of
/// the published snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<SurveyFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<SurveyFeature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// One survey record: an attribute mapping plus optional geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyFeature {
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,
    /// Polygon geometry when the query asked for it; kept opaque — this
    /// system transforms attributes and passes geometry through untouched.
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

// ── Traits ───────────────────────────────────────────────────────────────

/// The remote query interface, consumed as a black box.
#[async_trait]
pub trait FeatureService: Send + Sync {
    /// Identifier-only projection: the image filename of every record in the
    /// extent, no geometry.
    async fn query_image_names(&self, extent: &SpatialExtent) -> Result<Vec<String>, SyncError>;

    /// Full projection with geometry, for the metadata snapshot.
    async fn query_full(&self, extent: &SpatialExtent) -> Result<FeatureCollection, SyncError>;
}

/// The remote file host: a byte fetch keyed by the record's filename.
#[async_trait]
pub trait SurveyHost: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, RecordError>;
}

// ── Reqwest-backed implementations ───────────────────────────────────────

/// [`FeatureService`] over the Esri REST `query` endpoint.
pub struct RestFeatureService {
    url: String,
    client: reqwest::Client,
}

impl RestFeatureService {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SyncError::Internal(format!("build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn query(&self, extent: &SpatialExtent, projection: Projection) -> Result<Value, SyncError> {
        let query_url = format!("{}/query", self.url);
        let geometry = extent.to_query_geometry();
        let params: [(&str, &str); 6] = [
            ("f", projection.format),
            ("geometry", &geometry),
            ("geometryType", "esriGeometryPolygon"),
            ("spatialRel", "esriSpatialRelIntersects"),
            ("outFields", projection.out_fields),
            ("returnGeometry", projection.return_geometry),
        ];

        let response = self
            .client
            .get(&query_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SyncError::Query {
                url: query_url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SyncError::ServiceStatus {
                url: query_url,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| SyncError::Query {
            url: query_url.clone(),
            reason: format!("decode response: {e}"),
        })?;

        // The service reports failures (bad geometry, unknown fields) in a
        // JSON error body under HTTP 200.
        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified service error");
            return Err(SyncError::Query {
                url: query_url,
                reason: format!("service error {code}: {message}"),
            });
        }

        Ok(body)
    }
}

struct Projection {
    format: &'static str,
    out_fields: &'static str,
    return_geometry: &'static str,
}

#[async_trait]
impl FeatureService for RestFeatureService {
    async fn query_image_names(&self, extent: &SpatialExtent) -> Result<Vec<String>, SyncError> {
        let body = self
            .query(
                extent,
                Projection {
                    format: "json",
                    out_fields: IMAGE_FIELD,
                    return_geometry: "false",
                },
            )
            .await?;

        let response: AttributeQueryResponse =
            serde_json::from_value(body).map_err(|e| SyncError::Query {
                url: self.url.clone(),
                reason: format!("decode feature set: {e}"),
            })?;

        let mut names = Vec::with_capacity(response.features.len());
        for feature in response.features {
            match feature.attributes.get(IMAGE_FIELD).and_then(Value::as_str) {
                Some(name) if !name.is_empty() => names.push(name.to_string()),
                _ => warn!("record without {IMAGE_FIELD}, skipping"),
            }
        }
        debug!("identifier query returned {} names", names.len());
        Ok(names)
    }

    async fn query_full(&self, extent: &SpatialExtent) -> Result<FeatureCollection, SyncError> {
        let body = self
            .query(
                extent,
                Projection {
                    format: "geojson",
                    out_fields: "*",
                    return_geometry: "true",
                },
            )
            .await?;

        serde_json::from_value(body).map_err(|e| SyncError::Query {
            url: self.url.clone(),
            reason: format!("decode feature collection: {e}"),
        })
    }
}

/// Identifier-query response shape (`f=json`).
#[derive(Debug, Deserialize)]
struct AttributeQueryResponse {
    #[serde(default)]
    features: Vec<AttributeFeature>,
}

#[derive(Debug, Deserialize)]
struct AttributeFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
}

/// [`SurveyHost`] over plain unauthenticated HTTP GETs.
pub struct HttpSurveyHost {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSurveyHost {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SyncError::Internal(format!("build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl SurveyHost for HttpSurveyHost {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, RecordError> {
        let url = format!("{}{name}", self.base_url);
        let download_err = |reason: String| RecordError::Download {
            name: name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_err(format!("read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
