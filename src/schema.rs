//! Feature schema artifacts
//!
//! The schema is the ordered list of feature-column names the trained model
//! was fit on. Order is the positional contract with the model and is fixed
//! at training time. The name→position map is built once at load so request
//! handling indexes a plain vector instead of allocating a map per request.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PreverError, Result};

/// Ordered feature-column names plus a precomputed position index
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Build a schema from an ordered column list
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.clone(), pos))
            .collect();
        Self { columns, index }
    }

    /// Load the ordered column list from a JSON array artifact
    ///
    /// Any failure (missing file, malformed JSON, empty list) is reported as
    /// `SchemaUnavailable` so callers can fall back to legacy mode.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PreverError::SchemaUnavailable {
            reason: format!("{}: {e}", path.display()),
        })?;
        let columns: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| PreverError::SchemaUnavailable {
                reason: format!("{}: {e}", path.display()),
            })?;
        if columns.is_empty() {
            return Err(PreverError::SchemaUnavailable {
                reason: format!("{}: empty column list", path.display()),
            });
        }
        Ok(Self::new(columns))
    }

    /// Number of feature columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Ordered column names
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column, if present
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

/// Observed price range of the training target, for logging/ops only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Smallest target value kept after cleaning
    pub min: f64,
    /// Largest target value kept after cleaning
    pub max: f64,
}

/// Trainer-emitted metadata accompanying the schema
///
/// Performance fields are informational and never consulted during
/// inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Model version tag (e.g. "v0.8")
    pub version: String,
    /// Number of feature columns the model was fit on
    pub n_features: usize,
    /// Ordered feature columns, duplicated here for artifact self-description
    pub feature_columns: Vec<String>,
    /// Coefficient of determination on the held-out split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    /// Root mean squared error on the held-out split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    /// Target price range after cleaning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl SchemaMetadata {
    /// Load metadata from its JSON artifact
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PreverError::SchemaUnavailable {
            reason: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| PreverError::SchemaUnavailable {
            reason: format!("{}: {e}", path.display()),
        })
    }

    /// Write metadata to its JSON artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| PreverError::Internal(format!("metadata serialization: {e}")))?;
        fs::write(path, raw)?;
        Ok(())
    }
}
