//! Trained regressor artifact
//!
//! Inference treats the model as an opaque predict capability: an ordered
//! numeric vector in, a scalar out. The concrete artifact is a linear
//! regressor serialized as JSON by the offline trainer.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PreverError, Result};

/// A trained regressor: `predict(ordered-numeric-vector) -> scalar`
pub trait Regressor: Send + Sync {
    /// Number of features the model was fit on
    fn n_features(&self) -> usize;

    /// Predict a scalar from an ordered feature vector
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

/// Ordinary least squares linear regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Bias term
    pub intercept: f64,
    /// Per-feature weights, in schema column order
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Create a model from fitted parameters
    #[must_use]
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// Load the model from its JSON artifact
    ///
    /// Any failure (missing file, malformed JSON, empty or non-finite
    /// weights) is reported as `ModelUnavailable`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PreverError::ModelUnavailable {
            reason: format!("{}: {e}", path.display()),
        })?;
        let model: Self =
            serde_json::from_str(&raw).map_err(|e| PreverError::ModelUnavailable {
                reason: format!("{}: {e}", path.display()),
            })?;
        if model.coefficients.is_empty() {
            return Err(PreverError::ModelUnavailable {
                reason: format!("{}: no coefficients", path.display()),
            });
        }
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PreverError::ModelUnavailable {
                reason: format!("{}: non-finite weights", path.display()),
            });
        }
        Ok(model)
    }

    /// Write the model to its JSON artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| PreverError::Internal(format!("model serialization: {e}")))?;
        fs::write(path, raw)?;
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(PreverError::FeatureMismatch {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features.iter())
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }
}
