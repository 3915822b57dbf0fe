//! Pre-fitted feature scalers.

use landslide_inference_models::{FEATURE_COUNT, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// A fitted per-feature scaling transform, read from a JSON artifact
/// tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`; a zero scale leaves the centred value as is.
    StandardScaler {
        /// Per-feature mean.
        mean: Vec<f64>,
        /// Per-feature standard deviation.
        scale: Vec<f64>,
    },
    /// `x * scale + min`.
    MinMaxScaler {
        /// Per-feature offset.
        min: Vec<f64>,
        /// Per-feature factor.
        scale: Vec<f64>,
    },
}

impl Scaler {
    /// A scaler that returns its input unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self::StandardScaler {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    /// Checks that the scaler covers exactly the feature schema with finite
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidArtifact`] otherwise.
    pub fn validate(&self) -> Result<(), InferenceError> {
        let (name, offsets, scales) = match self {
            Self::StandardScaler { mean, scale } => ("mean", mean, scale),
            Self::MinMaxScaler { min, scale } => ("min", min, scale),
        };

        for (param, values) in [(name, offsets), ("scale", scales)] {
            if values.len() != FEATURE_COUNT {
                return Err(InferenceError::InvalidArtifact(format!(
                    "scaler {param} has {} entries, expected {FEATURE_COUNT}",
                    values.len()
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(InferenceError::InvalidArtifact(format!(
                    "scaler {param} contains non-finite values"
                )));
            }
        }

        Ok(())
    }

    /// Applies the transform elementwise.
    #[must_use]
    pub fn transform(&self, vector: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = *vector.values();
        match self {
            Self::StandardScaler { mean, scale } => {
                for ((x, m), s) in out.iter_mut().zip(mean).zip(scale) {
                    let s = if s.abs() > 0.0 { *s } else { 1.0 };
                    *x = (*x - m) / s;
                }
            }
            Self::MinMaxScaler { min, scale } => {
                for ((x, m), s) in out.iter_mut().zip(min).zip(scale) {
                    *x = x.mul_add(*s, *m);
                }
            }
        }
        out
    }
}
