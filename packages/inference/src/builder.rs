//! Assembly of the fixed-order feature vector from loosely typed input.

use landslide_inference_models::{FEATURE_COUNT, FeatureField, FeatureVector};
use serde_json::{Map, Value};

use crate::InferenceError;

/// Builds a [`FeatureVector`] field by field. Fields never set stay `0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVectorBuilder {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVectorBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Parses a request body holding any subset of the 15 fields.
    ///
    /// Each field is read from its wire key, or from its canonical
    /// `snake_case` name when the wire key is absent. Unknown keys are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidFeatureInput`] if `body` is not an
    /// object or a present field is not numeric.
    pub fn from_json(body: &Value) -> Result<FeatureVector, InferenceError> {
        let object = body.as_object().ok_or_else(|| {
            InferenceError::InvalidFeatureInput(format!(
                "expected a JSON object, found {}",
                json_kind(body)
            ))
        })?;

        let mut builder = Self::new();
        for field in FeatureField::all() {
            if let Some(value) = field_value(object, *field) {
                builder = builder.set_json(*field, value)?;
            }
        }
        Ok(builder.build())
    }

    /// Sets the integer soil class.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn soil_type(mut self, code: i64) -> Self {
        self.values[FeatureField::SoilType.index()] = code as f64;
        self
    }

    /// Sets the slope; a missing sample counts as `0`.
    #[must_use]
    pub fn slope(mut self, slope: Option<f64>) -> Self {
        self.values[FeatureField::Slope.index()] = slope.filter(|s| s.is_finite()).unwrap_or(0.0);
        self
    }

    /// Sets one field to a numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidFeatureInput`] for a non-finite
    /// value.
    pub fn set(mut self, field: FeatureField, value: f64) -> Result<Self, InferenceError> {
        if !value.is_finite() {
            return Err(invalid(field, format!("{value} is not a finite number")));
        }
        self.values[field.index()] = if field.is_integer() {
            value.trunc()
        } else {
            value
        };
        Ok(self)
    }

    /// Sets one field from a JSON number or numeric string.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidFeatureInput`] if the value is not
    /// numeric.
    pub fn set_json(self, field: FeatureField, value: &Value) -> Result<Self, InferenceError> {
        let parsed = parse_value(field, value)?;
        self.set(field, parsed)
    }

    /// Copies the weather fields found in `fields`, leaving soil type and
    /// slope untouched.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidFeatureInput`] if a present field
    /// is not numeric.
    pub fn weather(mut self, fields: &Map<String, Value>) -> Result<Self, InferenceError> {
        for field in FeatureField::all()
            .iter()
            .filter(|f| !matches!(f, FeatureField::SoilType | FeatureField::Slope))
        {
            if let Some(value) = field_value(fields, *field) {
                self = self.set_json(*field, value)?;
            }
        }
        Ok(self)
    }

    #[must_use]
    pub const fn build(self) -> FeatureVector {
        FeatureVector::new(self.values)
    }
}

fn field_value(object: &Map<String, Value>, field: FeatureField) -> Option<&Value> {
    object
        .get(field.wire_key())
        .or_else(|| object.get(field.canonical_name()))
}

/// Reads a JSON number or numeric string. Integer fields truncate numbers
/// and require strings to be integers.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidFeatureInput`] for anything else.
#[allow(clippy::cast_precision_loss)]
pub fn parse_value(field: FeatureField, value: &Value) -> Result<f64, InferenceError> {
    match value {
        Value::Number(number) => {
            let parsed = number
                .as_f64()
                .ok_or_else(|| invalid(field, format!("{number} is not representable")))?;
            Ok(if field.is_integer() {
                parsed.trunc()
            } else {
                parsed
            })
        }
        Value::String(text) => {
            let text = text.trim();
            let parsed = if field.is_integer() {
                text.parse::<i64>()
                    .map(|n| n as f64)
                    .map_err(|_| invalid(field, format!("{text:?} is not an integer")))?
            } else {
                text.parse::<f64>()
                    .map_err(|_| invalid(field, format!("{text:?} is not a number")))?
            };
            if !parsed.is_finite() {
                return Err(invalid(field, format!("{text:?} is not a finite number")));
            }
            Ok(parsed)
        }
        other => Err(invalid(
            field,
            format!("expected a number, found {}", json_kind(other)),
        )),
    }
}

fn invalid(field: FeatureField, message: String) -> InferenceError {
    InferenceError::InvalidFeatureInput(format!("{field}: {message}"))
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
