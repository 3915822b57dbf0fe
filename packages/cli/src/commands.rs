//! One-shot commands that run against the configured resources without
//! starting the HTTP server.

use landslide_features::ResolveError;
use landslide_inference::{
    Classifier, FeatureField, FeatureVector, FeatureVectorBuilder, InferenceError, Scaler,
    parse_value,
};
use landslide_server::{AppState, ConfigError, LandslideConfig};
use landslide_server_models::{ApiGeoAttributes, ApiPrediction};
use serde_json::Value;

/// Errors from the one-shot commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Geo lookup error.
    #[error("Lookup error: {0}")]
    Resolve(#[from] ResolveError),

    /// Inference error.
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The looked-up soil type cannot be used as a model input.
    #[error("Soil type {0:?} is not a numeric soil class")]
    SoilType(String),
}

/// Resolves slope and soil type at `(lon, lat)`.
///
/// # Errors
///
/// Returns an error if the position is invalid or a layer is unavailable.
pub fn lookup(state: &AppState, lon: f64, lat: f64) -> Result<ApiGeoAttributes, CliError> {
    Ok(state.resolver.resolve(lon, lat)?.into())
}

/// Classifies `input`, a JSON object of model features.
///
/// With `location`, soil type and slope come from a lookup at that
/// `(lon, lat)` and only the weather fields are read from `input`.
///
/// # Errors
///
/// Returns an error if the input is malformed, the lookup fails, the
/// looked-up soil type is not numeric or the model is unavailable.
pub fn predict(
    state: &AppState,
    input: &Value,
    location: Option<(f64, f64)>,
) -> Result<ApiPrediction, CliError> {
    let vector = match location {
        Some((lon, lat)) => located_vector(state, input, lon, lat)?,
        None => FeatureVectorBuilder::from_json(input)?,
    };

    log::debug!("Feature vector: {:?}", vector.values());

    Ok(state.engine.predict(&vector)?.into())
}

fn located_vector(
    state: &AppState,
    input: &Value,
    lon: f64,
    lat: f64,
) -> Result<FeatureVector, CliError> {
    let weather = input.as_object().ok_or_else(|| {
        InferenceError::InvalidFeatureInput("expected a JSON object of weather fields".to_string())
    })?;

    let attrs = state.resolver.resolve(lon, lat)?;
    let label = attrs.soil_type.unwrap_or_default();
    let soil_type = parse_value(FeatureField::SoilType, &Value::String(label.clone()))
        .map_err(|_| CliError::SoilType(label))?;

    log::info!("Resolved soil type {soil_type} and slope {:?}", attrs.slope);

    #[allow(clippy::cast_possible_truncation)]
    let builder = FeatureVectorBuilder::new()
        .soil_type(soil_type as i64)
        .slope(attrs.slope)
        .weather(weather)?;

    Ok(builder.build())
}

/// Describes the effective configuration and the state of every resource.
///
/// # Errors
///
/// Returns [`CliError::Config`] if the configuration cannot be rendered.
pub fn inspect(config: &LandslideConfig, state: &AppState) -> Result<String, CliError> {
    let mut lines = vec!["Configuration:".to_string()];
    lines.extend(
        config
            .to_toml_string()?
            .lines()
            .map(|line| format!("  {line}")),
    );
    lines.push(String::new());

    lines.push(state.resolver.soil_index().map_or_else(
        || "Soil index:   unavailable".to_string(),
        |index| {
            format!(
                "Soil index:   {} polygons, attribute {}, {}",
                index.len(),
                index.attribute_field(),
                index.crs()
            )
        },
    ));

    lines.push(state.resolver.slope_sampler().map_or_else(
        || "Slope raster: unavailable".to_string(),
        |sampler| {
            let dataset = sampler.dataset();
            let bounds = dataset.bounds();
            format!(
                "Slope raster: {}x{} pixels, {}, bounds [{}, {}, {}, {}], nodata {}",
                dataset.width(),
                dataset.height(),
                dataset.crs(),
                bounds.left,
                bounds.bottom,
                bounds.right,
                bounds.top,
                dataset
                    .nodata()
                    .map_or_else(|| "none".to_string(), |n| n.to_string())
            )
        },
    ));

    lines.push(match (state.engine.scaler(), state.engine.classifier()) {
        (Some(scaler), Some(classifier)) => format!(
            "Model:        {} + {}",
            describe_scaler(scaler),
            describe_classifier(classifier)
        ),
        _ => format!(
            "Model:        unavailable ({})",
            state.engine.unavailable_reason().unwrap_or("unknown reason")
        ),
    });

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

const fn describe_scaler(scaler: &Scaler) -> &'static str {
    match scaler {
        Scaler::StandardScaler { .. } => "standard scaler",
        Scaler::MinMaxScaler { .. } => "min-max scaler",
    }
}

fn describe_classifier(classifier: &Classifier) -> String {
    match classifier {
        Classifier::LogisticRegression { .. } => "logistic regression".to_string(),
        Classifier::RandomForest { trees } => format!("random forest of {} trees", trees.len()),
    }
}
