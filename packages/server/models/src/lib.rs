#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the landslide risk server.
//!
//! The geo and prediction payloads keep the field names the existing front
//! end already reads (`soil_type`, `prediction`, `confidence`); only the
//! health endpoint uses `camelCase`.

use landslide_features::GeoAttributes;
use landslide_inference_models::{PredictionLabel, PredictionResult};
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /get_geo_data`.
///
/// Kept as raw strings so that a malformed value produces the endpoint's
/// own error body rather than the framework's.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoQueryParams {
    /// Latitude in degrees.
    pub lat: Option<String>,
    /// Longitude in degrees.
    pub lon: Option<String>,
}

impl GeoQueryParams {
    /// Parsed `(lon, lat)`, or `None` if either is missing or not a number.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lon = self.lon.as_deref()?.trim().parse().ok()?;
        let lat = self.lat.as_deref()?.trim().parse().ok()?;
        Some((lon, lat))
    }
}

/// Slope and soil type at a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiGeoAttributes {
    /// Slope value, `null` outside the raster or on nodata.
    pub slope: Option<f64>,
    /// Soil type label, `"Unknown"` outside every polygon.
    pub soil_type: Option<String>,
}

impl From<GeoAttributes> for ApiGeoAttributes {
    fn from(attrs: GeoAttributes) -> Self {
        Self {
            slope: attrs.slope,
            soil_type: attrs.soil_type,
        }
    }
}

/// Response of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPrediction {
    /// Predicted class label.
    pub prediction: PredictionLabel,
    /// Confidence as a percentage string, e.g. `"62.25%"`.
    pub confidence: String,
}

impl From<PredictionResult> for ApiPrediction {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            confidence: result.confidence_percent(),
        }
    }
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether every startup resource loaded.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Per-resource availability.
    pub resources: ApiResources,
}

/// Availability of each startup resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResources {
    /// Soil polygon index.
    pub soil_index: bool,
    /// Slope raster.
    pub slope_raster: bool,
    /// Scaler and classifier.
    pub model: bool,
}

impl ApiResources {
    /// Whether everything loaded.
    #[must_use]
    pub const fn all_available(&self) -> bool {
        self.soil_index && self.slope_raster && self.model
    }
}
