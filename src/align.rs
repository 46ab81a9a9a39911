//! Feature alignment: raw JSON payload → ordered feature vector
//!
//! This is the positional contract with the trained model. Three modes
//! exist, selected once when the artifacts load and never inferred per
//! request:
//!
//! - **Legacy**: fixed `[area, quartos]` pair, kept for model versions that
//!   predate schema metadata.
//! - **Aliased**: schema-driven with a fixed payload→column alias table and
//!   one-hot indicator resolution; omitted fields default to 0, unseen
//!   categories contribute zero signal and are surfaced as caveats.
//! - **Strict**: every schema column is a literal required payload field;
//!   validation accumulates every problem before failing.
//!
//! Alignment is a pure function of (payload, mode): no I/O, no locking, no
//! hidden state.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{FieldError, PreverError, Result};
use crate::schema::FeatureSchema;

/// Payload field → schema column aliases, applied in declaration order
///
/// Later entries overwrite earlier ones when both payload fields target the
/// same column.
const ALIASES: &[(&str, &str)] = &[
    ("area", "listing.usableAreas"),
    ("quartos", "listing.bedrooms"),
    ("bedrooms", "listing.bedrooms"),
    ("bathrooms", "listing.bathrooms"),
    ("banheiros", "listing.bathrooms"),
    ("parkingSpaces", "listing.parkingSpaces"),
    ("vagas", "listing.parkingSpaces"),
];

/// Categorical payload field → candidate one-hot base columns, tried in order
const SELECTORS: &[(&str, &[&str])] = &[
    ("city", &["listing.address.city", "city"]),
    ("imvl_type", &["imvl_type"]),
];

/// How payloads are reconciled with the model's expected input
#[derive(Debug, Clone)]
pub enum FeatureMode {
    /// Fixed `[area, quartos]` contract for pre-schema model versions
    Legacy,
    /// Flat schema: every column is a literal required numeric field
    Strict(FeatureSchema),
    /// Mixed schema: alias table plus one-hot indicator columns
    Aliased(FeatureSchema),
}

impl FeatureMode {
    /// Classify a loaded schema by shape
    ///
    /// A schema that mentions any alias target or one-hot base prefix was
    /// produced by the dummy-encoding trainer and gets the aliased policy;
    /// a flat literal list gets the strict policy.
    #[must_use]
    pub fn from_schema(schema: FeatureSchema) -> Self {
        let aliased = schema.columns().iter().any(|column| {
            ALIASES.iter().any(|(_, target)| column == target)
                || SELECTORS.iter().any(|(_, bases)| {
                    bases
                        .iter()
                        .any(|base| column.starts_with(&format!("{base}_")))
                })
        });
        if aliased {
            Self::Aliased(schema)
        } else {
            Self::Strict(schema)
        }
    }

    /// Number of features this mode emits
    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Self::Legacy => 2,
            Self::Strict(schema) | Self::Aliased(schema) => schema.len(),
        }
    }

    /// Short label for logs and health reporting
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Strict(_) => "strict",
            Self::Aliased(_) => "aliased",
        }
    }
}

/// Non-fatal alignment observation, surfaced to callers alongside the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caveat {
    /// A supplied categorical value has no matching one-hot column
    UnknownCategory {
        /// Payload field the value came from
        field: String,
        /// The unmatched category value
        value: String,
    },
}

impl fmt::Display for Caveat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCategory { field, value } => write!(
                f,
                "unknown {field} \"{value}\": not seen at training time, contributes no signal"
            ),
        }
    }
}

/// Result of aligning a payload: the ordered vector plus any caveats
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Ordered feature vector, `len == mode.n_features()`, every entry finite
    pub vector: Vec<f64>,
    /// Non-fatal observations (unknown categories)
    pub caveats: Vec<Caveat>,
}

/// Coerce a JSON value to a finite float
///
/// Accepts numbers and numeric strings. Null is "absent", not a number.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Render a categorical payload value the way it would appear in a one-hot
/// column name
fn as_category(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Align a raw payload with the model's expected input
///
/// The output vector always has exactly `mode.n_features()` entries, every
/// entry finite. Unrecognized payload fields are ignored in every mode.
pub fn align(payload: &Map<String, Value>, mode: &FeatureMode) -> Result<Alignment> {
    match mode {
        FeatureMode::Legacy => align_legacy(payload),
        FeatureMode::Aliased(schema) => align_aliased(payload, schema),
        FeatureMode::Strict(schema) => align_strict(payload, schema),
    }
}

/// Fixed two-feature contract: `[area, quartos]`, missing fields default to 0
fn align_legacy(payload: &Map<String, Value>) -> Result<Alignment> {
    let mut errors = Vec::new();

    let area = match payload.get("area") {
        None | Some(Value::Null) => 0.0,
        Some(value) => as_number(value).unwrap_or_else(|| {
            errors.push(FieldError::not_numeric("area", value.to_string()));
            0.0
        }),
    };

    // Bedrooms are a count; the coerced value is truncated to an integer.
    let quartos = match payload.get("quartos").or_else(|| payload.get("bedrooms")) {
        None | Some(Value::Null) => 0.0,
        Some(value) => as_number(value).map(f64::trunc).unwrap_or_else(|| {
            errors.push(FieldError::not_numeric("quartos", value.to_string()));
            0.0
        }),
    };

    if !errors.is_empty() {
        return Err(PreverError::Validation(errors));
    }

    Ok(Alignment {
        vector: vec![area, quartos],
        caveats: Vec::new(),
    })
}

/// Schema-driven alignment with aliasing and one-hot resolution
///
/// Every column starts at 0. Known aliases overwrite their target column
/// when the payload supplies a value; categorical selectors set the matching
/// `<base>_<value>` indicator to 1. A present-but-uncoercible alias value is
/// a validation error; an unseen category is a caveat, never an error.
fn align_aliased(payload: &Map<String, Value>, schema: &FeatureSchema) -> Result<Alignment> {
    let mut vector = vec![0.0; schema.len()];
    let mut errors = Vec::new();
    let mut caveats = Vec::new();

    for (field, column) in ALIASES {
        let Some(pos) = schema.position(column) else {
            continue;
        };
        match payload.get(*field) {
            None | Some(Value::Null) => {},
            Some(value) => match as_number(value) {
                Some(v) => vector[pos] = v,
                None => errors.push(FieldError::not_numeric(*field, value.to_string())),
            },
        }
    }

    for (field, bases) in SELECTORS {
        let Some(value) = payload.get(*field) else {
            continue;
        };
        let Some(category) = as_category(value) else {
            continue;
        };
        let mut matched = false;
        for base in *bases {
            if let Some(pos) = schema.position(&format!("{base}_{category}")) {
                vector[pos] = 1.0;
                matched = true;
                break;
            }
        }
        if !matched {
            caveats.push(Caveat::UnknownCategory {
                field: (*field).to_string(),
                value: category,
            });
        }
    }

    if !errors.is_empty() {
        return Err(PreverError::Validation(errors));
    }

    Ok(Alignment { vector, caveats })
}

/// Flat-schema alignment: every column is a literal required payload field
///
/// Problems accumulate across all columns and the whole operation fails with
/// the full list, so a caller can fix everything in one round trip.
fn align_strict(payload: &Map<String, Value>, schema: &FeatureSchema) -> Result<Alignment> {
    let mut vector = vec![0.0; schema.len()];
    let mut errors = Vec::new();

    for (pos, column) in schema.columns().iter().enumerate() {
        match payload.get(column) {
            None | Some(Value::Null) => errors.push(FieldError::missing(column)),
            Some(value) => match as_number(value) {
                Some(v) => vector[pos] = v,
                None => errors.push(FieldError::not_numeric(column, value.to_string())),
            },
        }
    }

    if !errors.is_empty() {
        return Err(PreverError::Validation(errors));
    }

    Ok(Alignment {
        vector,
        caveats: Vec::new(),
    })
}

/// Echo values for the response body: coerced area and truncated bedroom
/// count, 0 when absent
#[must_use]
pub fn echo_fields(payload: &Map<String, Value>) -> (f64, i64) {
    let area = payload.get("area").and_then(as_number).unwrap_or(0.0);
    let quartos = payload
        .get("quartos")
        .or_else(|| payload.get("bedrooms"))
        .and_then(as_number)
        .map_or(0, |v| v.trunc() as i64);
    (area, quartos)
}
