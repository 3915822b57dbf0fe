#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Landslide risk inference.
//!
//! [`FeatureVectorBuilder`] turns request input into the fixed 15-slot
//! [`FeatureVector`]; [`InferenceEngine`] scales it with a pre-fitted
//! [`Scaler`] and classifies it with a pre-fitted [`Classifier`]. Both
//! artifacts are loaded once at startup. If either fails to load, the
//! engine stays unavailable for the life of the process.

mod builder;
mod classifier;
mod scaler;

use std::path::Path;

pub use builder::{FeatureVectorBuilder, parse_value};
pub use classifier::{Classifier, DecisionTree};
pub use landslide_inference_models::{
    CLASS_COUNT, FEATURE_COUNT, FeatureField, FeatureVector, PredictionLabel, PredictionResult,
};
pub use scaler::Scaler;

/// Errors from feature assembly, artifact loading and prediction.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// A request field is not numeric.
    #[error("Invalid feature input: {0}")]
    InvalidFeatureInput(String),

    /// The scaler or classifier failed to load at startup.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// An artifact does not fit the feature schema.
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// The classifier produced unusable output.
    #[error("Model error: {0}")]
    Model(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
struct Model {
    scaler: Scaler,
    classifier: Classifier,
}

/// Scales and classifies feature vectors.
#[derive(Debug)]
pub struct InferenceEngine {
    model: Result<Model, String>,
}

impl InferenceEngine {
    /// Creates an engine from in-memory artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidArtifact`] if either artifact does
    /// not fit the feature schema.
    pub fn new(scaler: Scaler, classifier: Classifier) -> Result<Self, InferenceError> {
        scaler.validate()?;
        classifier.validate()?;
        Ok(Self {
            model: Ok(Model { scaler, classifier }),
        })
    }

    /// An engine that rejects every prediction with `reason`.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            model: Err(reason.into()),
        }
    }

    /// Loads both artifacts from JSON files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, parsed or validated.
    pub fn try_load(scaler_path: &Path, classifier_path: &Path) -> Result<Self, InferenceError> {
        let scaler: Scaler = read_artifact(scaler_path)?;
        let classifier: Classifier = read_artifact(classifier_path)?;
        let engine = Self::new(scaler, classifier)?;

        log::info!(
            "Loaded scaler {} and classifier {}",
            scaler_path.display(),
            classifier_path.display()
        );

        Ok(engine)
    }

    /// Loads both artifacts, falling back to an unavailable engine on
    /// failure. The failure is logged once here and then reported to every
    /// caller of [`Self::predict`].
    #[must_use]
    pub fn load(scaler_path: &Path, classifier_path: &Path) -> Self {
        Self::try_load(scaler_path, classifier_path).unwrap_or_else(|e| {
            log::error!("Model artifacts failed to load, predictions disabled: {e}");
            Self::unavailable(e.to_string())
        })
    }

    /// Whether predictions can be served.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.model.is_ok()
    }

    /// Why the engine is unavailable, if it is.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.model.as_ref().err().map(String::as_str)
    }

    /// The loaded classifier, if any.
    #[must_use]
    pub fn classifier(&self) -> Option<&Classifier> {
        self.model.as_ref().ok().map(|m| &m.classifier)
    }

    /// The loaded scaler, if any.
    #[must_use]
    pub fn scaler(&self) -> Option<&Scaler> {
        self.model.as_ref().ok().map(|m| &m.scaler)
    }

    /// Predicts the landslide class for `vector`.
    ///
    /// The label is the most probable class; on a tie the lower class
    /// index wins.
    ///
    /// # Errors
    ///
    /// * [`InferenceError::ModelUnavailable`] if the artifacts failed to
    ///   load
    /// * [`InferenceError::Model`] if the classifier output is not a valid
    ///   probability distribution
    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, InferenceError> {
        let model = self
            .model
            .as_ref()
            .map_err(|reason| InferenceError::ModelUnavailable(reason.clone()))?;

        let scaled = model.scaler.transform(vector);
        let probabilities = model.classifier.predict_proba(&scaled)?;

        if probabilities
            .iter()
            .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
        {
            return Err(InferenceError::Model(format!(
                "classifier returned invalid probabilities {probabilities:?}"
            )));
        }

        let class = usize::from(probabilities[1] > probabilities[0]);
        let label = PredictionLabel::from_class(class).ok_or_else(|| {
            InferenceError::Model(format!("no label for class {class}"))
        })?;

        Ok(PredictionResult {
            label,
            confidence: probabilities[class],
            probabilities,
        })
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InferenceError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        InferenceError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    Ok(serde_json::from_str(&contents)?)
}
