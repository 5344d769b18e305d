//! Spatial extent: the fixed polygon every query is filtered against.
//!
//! The extent is constant for the life of a run. It is carried inside
//! [`crate::config::SyncConfig`] rather than as module state so tests and
//! alternate deployments can substitute their own polygon.

use serde::{Deserialize, Serialize};

/// A closed polygon plus spatial-reference identifier, in the Esri JSON
/// geometry shape the feature service expects.
///
/// Invariant: every ring is closed (first vertex == last vertex). Validated
/// by [`SpatialExtent::validate`], which config building calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    /// Polygon rings; the first is the outer boundary.
    pub rings: Vec<Vec<[f64; 2]>>,
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

/// Well-known-id pair identifying the coordinate system of the rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
    #[serde(rename = "latestWkid", skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<u32>,
}

impl SpatialExtent {
    /// The Vernonia survey area (Oregon State Plane North, wkid 102970).
    pub fn vernonia() -> Self {
        Self {
            rings: vec![vec![
                [606_952.056_605_339, 1_490_512.450_573_906_3],
                [606_952.056_605_339, 1_529_343.406_516_656_3],
                [650_728.922_702_372_1, 1_529_343.406_516_656_3],
                [650_728.922_702_372_1, 1_490_512.450_573_906_3],
                [606_952.056_605_339, 1_490_512.450_573_906_3],
            ]],
            spatial_reference: SpatialReference {
                wkid: 102_970,
                latest_wkid: Some(6_557),
            },
        }
    }

    /// Check the closed-ring invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.rings.is_empty() {
            return Err("extent has no rings".into());
        }
        for (i, ring) in self.rings.iter().enumerate() {
            if ring.len() < 4 {
                return Err(format!("ring {i} has fewer than 4 vertices"));
            }
            if ring.first() != ring.last() {
                return Err(format!("ring {i} is not closed (first vertex != last)"));
            }
        }
        Ok(())
    }

    /// Serialise to the JSON string passed as the `geometry` query parameter.
    pub fn to_query_geometry(&self) -> String {
        // Serialising a plain struct with only owned data cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vernonia_extent_is_closed() {
        assert!(SpatialExtent::vernonia().validate().is_ok());
    }

    #[test]
    fn open_ring_rejected() {
        let extent = SpatialExtent {
            rings: vec![vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]],
            spatial_reference: SpatialReference {
                wkid: 102_970,
                latest_wkid: None,
            },
        };
        let err = extent.validate().unwrap_err();
        assert!(err.contains("not closed"), "got: {err}");
    }

    #[test]
    fn degenerate_ring_rejected() {
        let extent = SpatialExtent {
            rings: vec![vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
            spatial_reference: SpatialReference {
                wkid: 102_970,
                latest_wkid: None,
            },
        };
        assert!(extent.validate().is_err());
    }

    #[test]
    fn query_geometry_shape() {
        let json = SpatialExtent::vernonia().to_query_geometry();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(v["rings"].is_array());
        assert_eq!(v["spatialReference"]["wkid"], 102_970);
        assert_eq!(v["spatialReference"]["latestWkid"], 6_557);
    }
}
