//! Common types used across the secmap pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tabular row of the census-section dataset, keyed by the CUSEC code.
///
/// The CUSEC code is a fixed-width numeric-looking identifier and must stay
/// textual: coercing it to a number drops leading zeros and breaks the join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRow {
    /// Census-section code (join key)
    #[serde(rename = "CUSEC")]
    pub cusec: String,

    /// Number of tourist dwellings in the section
    #[serde(rename = "vivienda turistica", default)]
    pub tourist_dwellings: Option<f64>,

    /// Number of tourist accommodation places
    #[serde(rename = "plazas", default)]
    pub plazas: Option<f64>,

    /// Tourist dwellings as a percentage of all dwellings
    #[serde(rename = "Porcentaje vivienda turistica", default)]
    pub tourist_dwellings_pct: Option<f64>,
}

/// Pointer file written after a successful "latest" publish.
///
/// Serialized as `{"dataUrl", "lastUpdated", "versionedUrl"}` and consumed
/// by the web frontend to locate the most recent GeoJSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPointer {
    /// URL of the fixed "latest" object, always overwritten on publish
    pub data_url: String,

    /// Publish time
    pub last_updated: DateTime<Utc>,

    /// URL of the immutable timestamped object for this publish
    pub versioned_url: String,
}
