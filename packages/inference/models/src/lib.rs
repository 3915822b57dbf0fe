#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Feature schema and prediction types shared by the inference engine, the
//! server and the CLI.
//!
//! The classifier consumes a fixed 15-element vector. [`FeatureField`] is
//! the single source of truth for its order, its wire keys and its
//! canonical names.

use std::ops::Index;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of inputs the classifier expects.
pub const FEATURE_COUNT: usize = 15;

/// Number of classes the classifier predicts.
pub const CLASS_COUNT: usize = 2;

/// One slot of the feature vector, in schema order.
///
/// `Display`/`FromStr` use the wire key sent by the front end; note the
/// irregular `rain-intensity-6hr`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum FeatureField {
    /// Integer-coded soil class.
    #[strum(serialize = "soil_type")]
    SoilType,
    /// Terrain slope.
    #[strum(serialize = "slope")]
    Slope,
    /// Soil moisture.
    #[strum(serialize = "soil_moisture")]
    SoilMoisture,
    #[strum(serialize = "rainfall-3-hr")]
    Rainfall3h,
    #[strum(serialize = "rainfall-6-hr")]
    Rainfall6h,
    #[strum(serialize = "rainfall-12-hr")]
    Rainfall12h,
    #[strum(serialize = "rain-intensity-3-hr")]
    RainIntensity3h,
    #[strum(serialize = "rain-intensity-6hr")]
    RainIntensity6h,
    #[strum(serialize = "rain-intensity-12-hr")]
    RainIntensity12h,
    #[strum(serialize = "rainfall-1-day")]
    Rainfall1d,
    #[strum(serialize = "rainfall-3-day")]
    Rainfall3d,
    #[strum(serialize = "rainfall-5-day")]
    Rainfall5d,
    #[strum(serialize = "rain-intensity-1-day")]
    RainIntensity1d,
    #[strum(serialize = "rain-intensity-3-day")]
    RainIntensity3d,
    #[strum(serialize = "rain-intensity-5-day")]
    RainIntensity5d,
}

impl FeatureField {
    /// All fields in vector order.
    #[must_use]
    pub const fn all() -> &'static [Self; FEATURE_COUNT] {
        &[
            Self::SoilType,
            Self::Slope,
            Self::SoilMoisture,
            Self::Rainfall3h,
            Self::Rainfall6h,
            Self::Rainfall12h,
            Self::RainIntensity3h,
            Self::RainIntensity6h,
            Self::RainIntensity12h,
            Self::Rainfall1d,
            Self::Rainfall3d,
            Self::Rainfall5d,
            Self::RainIntensity1d,
            Self::RainIntensity3d,
            Self::RainIntensity5d,
        ]
    }

    /// Position of this field in the vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Key used by the front end's JSON payloads.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::SoilType => "soil_type",
            Self::Slope => "slope",
            Self::SoilMoisture => "soil_moisture",
            Self::Rainfall3h => "rainfall-3-hr",
            Self::Rainfall6h => "rainfall-6-hr",
            Self::Rainfall12h => "rainfall-12-hr",
            Self::RainIntensity3h => "rain-intensity-3-hr",
            Self::RainIntensity6h => "rain-intensity-6hr",
            Self::RainIntensity12h => "rain-intensity-12-hr",
            Self::Rainfall1d => "rainfall-1-day",
            Self::Rainfall3d => "rainfall-3-day",
            Self::Rainfall5d => "rainfall-5-day",
            Self::RainIntensity1d => "rain-intensity-1-day",
            Self::RainIntensity3d => "rain-intensity-3-day",
            Self::RainIntensity5d => "rain-intensity-5-day",
        }
    }

    /// Canonical `snake_case` name, accepted as an alias for the wire key.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::SoilType => "soil_type",
            Self::Slope => "slope",
            Self::SoilMoisture => "soil_moisture",
            Self::Rainfall3h => "rainfall_3h",
            Self::Rainfall6h => "rainfall_6h",
            Self::Rainfall12h => "rainfall_12h",
            Self::RainIntensity3h => "rain_intensity_3h",
            Self::RainIntensity6h => "rain_intensity_6h",
            Self::RainIntensity12h => "rain_intensity_12h",
            Self::Rainfall1d => "rainfall_1d",
            Self::Rainfall3d => "rainfall_3d",
            Self::Rainfall5d => "rainfall_5d",
            Self::RainIntensity1d => "rain_intensity_1d",
            Self::RainIntensity3d => "rain_intensity_3d",
            Self::RainIntensity5d => "rain_intensity_5d",
        }
    }

    /// Whether the field only takes integer codes.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::SoilType)
    }
}

/// Fixed-order classifier input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Wraps values already in schema order.
    #[must_use]
    pub const fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// All-zero vector.
    #[must_use]
    pub const fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    /// Values in schema order.
    #[must_use]
    pub const fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureField, f64)> + '_ {
        FeatureField::all().iter().copied().zip(self.0.iter().copied())
    }
}

impl Index<FeatureField> for FeatureVector {
    type Output = f64;

    fn index(&self, field: FeatureField) -> &f64 {
        &self.0[field.index()]
    }
}

/// Predicted class.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum PredictionLabel {
    /// Class 0.
    #[serde(rename = "No Landslide")]
    #[strum(serialize = "No Landslide")]
    NoLandslide,
    /// Class 1.
    #[serde(rename = "Landslide")]
    #[strum(serialize = "Landslide")]
    Landslide,
}

impl PredictionLabel {
    /// Label for a class index.
    #[must_use]
    pub const fn from_class(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::NoLandslide),
            1 => Some(Self::Landslide),
            _ => None,
        }
    }

    /// Class index of this label.
    #[must_use]
    pub const fn class(self) -> usize {
        self as usize
    }
}

/// Outcome of one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Most probable class.
    pub label: PredictionLabel,
    /// Probability of `label`, in `[0, 1]`.
    pub confidence: f64,
    /// Per-class probabilities indexed by class.
    pub probabilities: [f64; CLASS_COUNT],
}

impl PredictionResult {
    /// Confidence as a percentage with two decimals, e.g. `"62.25%"`.
    #[must_use]
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}
