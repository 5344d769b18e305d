//! Metadata transformation: raw service attributes → the stable public
//! schema, serialised as one GeoJSON snapshot.
//!
//! The service exposes truncated legacy column names (`NumberofSh`,
//! `Subdivisio`) and sentinel strings standing in for "no value". Publishing
//! consumers get a cleaned schema instead: renamed keys, real nulls,
//! defaulted display fields, human-readable dates, and a resolvable document
//! URL in place of the internal image filename.
//!
//! ## Rule order
//!
//! The six passes in [`transform_properties`] run in a fixed order because
//! later rules read fields earlier rules renamed or cleared: defaulting must
//! see the nulls produced by blank normalization, and the `Timestamp`
//! derivation must read `SurveyDate` while it still holds the raw epoch
//! value, before date formatting rewrites it as text.

use crate::error::SyncError;
use crate::pipeline::normalize;
use crate::service::FeatureCollection;
use chrono::TimeZone;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Source attribute carrying the image filename.
const IMAGE_KEY: &str = "SVY_IMAGE";

/// Legacy column names and their public replacements.
const RENAMES: [(&str, &str); 4] = [
    ("NumberofSh", "Sheets"),
    ("Subdivisio", "Subdivision"),
    ("SURVEYID", "SurveyId"),
    ("PLATID", "Plat"),
];

/// String values the service uses where it means "no value".
const BLANK_SENTINELS: [&str; 3] = ["", " ", "None Given"];

/// Display format for `FileDate` / `SurveyDate`: `M/D/YYYY`, UTC.
const DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Apply the full normalization pass to one feature's attribute map.
pub fn transform_properties(props: &mut Map<String, Value>, survey_base_url: &str) {
    // 1. Blank sentinels become real nulls.
    for value in props.values_mut() {
        if is_blank(value) {
            *value = Value::Null;
        }
    }

    // 2. Legacy names → public names, value preserved, old key dropped.
    for (from, to) in RENAMES {
        if let Some(value) = props.remove(from) {
            props.insert(to.to_string(), value);
        }
    }

    // 3. The image filename becomes a resolvable public URL.
    if let Some(value) = props.remove(IMAGE_KEY) {
        let url = match &value {
            Value::String(name) => Value::String(format!(
                "{survey_base_url}{}",
                normalize::document_name(name)
            )),
            _ => Value::Null,
        };
        props.insert("SurveyUrl".to_string(), url);
    }

    // 4. Display fields get a placeholder when null or absent; present
    //    values are never overwritten.
    for key in ["Client", "Firm", "SurveyType"] {
        default_when_null(props, key, "Unknown");
    }
    default_when_null(props, "Comments", "None");

    // 5. Machine-readable timestamp, taken from SurveyDate while it still
    //    holds the raw epoch milliseconds.
    let timestamp = props.get("SurveyDate").and_then(Value::as_i64).unwrap_or(0);
    props.insert("Timestamp".to_string(), Value::from(timestamp));

    // 6. Epoch milliseconds → short calendar strings.
    for key in ["FileDate", "SurveyDate"] {
        let formatted = props
            .get(key)
            .and_then(Value::as_i64)
            .and_then(format_epoch_date)
            .unwrap_or_else(|| "Unknown".to_string());
        props.insert(key.to_string(), Value::String(formatted));
    }
}

/// Apply [`transform_properties`] to every feature in the collection.
pub fn transform_collection(collection: &mut FeatureCollection, survey_base_url: &str) {
    for feature in &mut collection.features {
        transform_properties(&mut feature.properties, survey_base_url);
    }
    debug!("transformed {} features", collection.features.len());
}

/// Serialise the collection and atomically replace the snapshot file.
///
/// Written to a temp name first so a crash mid-write never leaves a partial
/// snapshot at the published path.
pub async fn write_snapshot(
    path: &Path,
    collection: &FeatureCollection,
) -> Result<(), SyncError> {
    let write_err = |source: std::io::Error| SyncError::SnapshotWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let json = serde_json::to_vec(collection)
        .map_err(|e| SyncError::Internal(format!("serialise snapshot: {e}")))?;

    let tmp = path.with_extension("geojson.tmp");
    tokio::fs::write(&tmp, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if BLANK_SENTINELS.contains(&s.as_str()))
}

fn default_when_null(props: &mut Map<String, Value>, key: &str, default: &str) {
    let missing = matches!(props.get(key), None | Some(Value::Null));
    if missing {
        props.insert(key.to_string(), Value::String(default.to_string()));
    }
}

fn format_epoch_date(millis: i64) -> Option<String> {
    chrono::Utc
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://gis.columbiacountymaps.com/Surveys/";

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn blank_sentinels_become_null_then_default() {
        let mut p = props(json!({
            "Client": "",
            "Firm": " ",
            "SurveyType": "None Given",
            "Comments": "None Given",
        }));
        transform_properties(&mut p, BASE);
        assert_eq!(p["Client"], "Unknown");
        assert_eq!(p["Firm"], "Unknown");
        assert_eq!(p["SurveyType"], "Unknown");
        assert_eq!(p["Comments"], "None");
    }

    #[test]
    fn present_values_are_never_overwritten() {
        let mut p = props(json!({ "Client": "Acme", "Comments": "left margin torn" }));
        transform_properties(&mut p, BASE);
        assert_eq!(p["Client"], "Acme");
        assert_eq!(p["Comments"], "left margin torn");
    }

    #[test]
    fn non_sentinel_strings_are_untouched() {
        let mut p = props(json!({ "Client": "  ", "Firm": "none given" }));
        transform_properties(&mut p, BASE);
        // Two spaces and lowercase variants are not sentinels.
        assert_eq!(p["Client"], "  ");
        assert_eq!(p["Firm"], "none given");
    }

    #[test]
    fn raw_keys_are_gone_after_renames() {
        let mut p = props(json!({
            "NumberofSh": 3,
            "Subdivisio": "Rose Hill",
            "SURVEYID": "CS 1234",
            "PLATID": "P-77",
            "SVY_IMAGE": "s1.tif",
        }));
        transform_properties(&mut p, BASE);

        for raw in ["NumberofSh", "Subdivisio", "SURVEYID", "PLATID", "SVY_IMAGE"] {
            assert!(!p.contains_key(raw), "{raw} must not survive the transform");
        }
        assert_eq!(p["Sheets"], 3);
        assert_eq!(p["Subdivision"], "Rose Hill");
        assert_eq!(p["SurveyId"], "CS 1234");
        assert_eq!(p["Plat"], "P-77");
    }

    #[test]
    fn image_reference_becomes_public_document_url() {
        let mut p = props(json!({ "SVY_IMAGE": "s1.tif" }));
        transform_properties(&mut p, BASE);
        assert_eq!(
            p["SurveyUrl"],
            "https://gis.columbiacountymaps.com/Surveys/s1.pdf"
        );
    }

    #[test]
    fn unrecognized_image_extension_passes_through_to_url() {
        let mut p = props(json!({ "SVY_IMAGE": "s1.bmp" }));
        transform_properties(&mut p, BASE);
        assert_eq!(
            p["SurveyUrl"],
            "https://gis.columbiacountymaps.com/Surveys/s1.bmp"
        );
    }

    #[test]
    fn timestamp_keeps_raw_epoch_and_dates_format() {
        let mut p = props(json!({
            "SurveyDate": 1_577_836_800_000_i64,
            "FileDate": 1_577_836_800_000_i64,
        }));
        transform_properties(&mut p, BASE);
        assert_eq!(p["Timestamp"], 1_577_836_800_000_i64);
        assert_eq!(p["SurveyDate"], "1/1/2020");
        assert_eq!(p["FileDate"], "1/1/2020");
    }

    #[test]
    fn absent_dates_read_unknown_and_timestamp_zero() {
        let mut p = props(json!({}));
        transform_properties(&mut p, BASE);
        assert_eq!(p["Timestamp"], 0);
        assert_eq!(p["SurveyDate"], "Unknown");
        assert_eq!(p["FileDate"], "Unknown");
    }

    #[test]
    fn blanked_survey_date_counts_as_absent() {
        // A " " SurveyDate is nulled in pass 1, so the timestamp falls back
        // to 0 and the display value to Unknown.
        let mut p = props(json!({ "SurveyDate": " " }));
        transform_properties(&mut p, BASE);
        assert_eq!(p["Timestamp"], 0);
        assert_eq!(p["SurveyDate"], "Unknown");
    }

    #[test]
    fn epoch_format_examples() {
        assert_eq!(format_epoch_date(1_577_836_800_000).unwrap(), "1/1/2020");
        assert_eq!(format_epoch_date(0).unwrap(), "1/1/1970");
        // 2021-12-25
        assert_eq!(format_epoch_date(1_640_390_400_000).unwrap(), "12/25/2021");
    }
}
