//! Error types for prever
//!
//! Two families of failures cross the serving boundary with different
//! visibility: validation problems are caller-facing and carry the full
//! list of offending fields, while artifact/load problems are service-level
//! and reported generically. Everything else is an internal error whose
//! detail stays server-side.

use std::fmt;

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, PreverError>;

/// What went wrong with a single payload field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// Required field absent (or JSON null)
    Missing,
    /// Present but not coercible to a finite number
    NotNumeric {
        /// The rejected value, rendered as JSON
        got: String,
    },
}

/// A single field-level validation failure
///
/// Validation accumulates these across the whole payload before failing,
/// so a caller can fix every problem in one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Payload field name
    pub field: String,
    /// The failure for this field
    pub problem: FieldProblem,
}

impl FieldError {
    /// Required field is absent
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: FieldProblem::Missing,
        }
    }

    /// Field is present but not a finite number
    pub fn not_numeric(field: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: FieldProblem::NotNumeric { got: got.into() },
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            FieldProblem::Missing => write!(f, "missing required field `{}`", self.field),
            FieldProblem::NotNumeric { got } => {
                write!(f, "field `{}`: {got} is not a number", self.field)
            },
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error type for prever operations
#[derive(Debug, Error)]
pub enum PreverError {
    /// Schema artifact missing or malformed (non-fatal: callers fall back to legacy mode)
    #[error("schema artifact unavailable: {reason}")]
    SchemaUnavailable {
        /// Why the artifact could not be used
        reason: String,
    },

    /// Model artifact missing or malformed (fatal for inference)
    #[error("model artifact unavailable: {reason}")]
    ModelUnavailable {
        /// Why the artifact could not be used
        reason: String,
    },

    /// One or more payload fields missing or non-numeric (full list, never just the first)
    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Feature vector length does not match the model
    #[error("feature mismatch: model expects {expected} features, got {got}")]
    FeatureMismatch {
        /// Features the model was trained on
        expected: usize,
        /// Features actually supplied
        got: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error during training
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Training pipeline failure
    #[error("training failed: {0}")]
    Training(String),

    /// Any other failure; detail is logged server-side, never sent to callers
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let err = FieldError::missing("b");
        assert_eq!(err.to_string(), "missing required field `b`");

        let err = FieldError::not_numeric("a", "\"notanumber\"");
        assert_eq!(err.to_string(), "field `a`: \"notanumber\" is not a number");
    }

    #[test]
    fn test_validation_reports_all_errors() {
        let err = PreverError::Validation(vec![
            FieldError::not_numeric("a", "\"x\""),
            FieldError::missing("b"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("`a`"));
        assert!(msg.contains("`b`"));
    }

    #[test]
    fn test_error_display() {
        let err = PreverError::SchemaUnavailable {
            reason: "no such file".to_string(),
        };
        assert!(err.to_string().contains("schema artifact unavailable"));

        let err = PreverError::FeatureMismatch {
            expected: 12,
            got: 2,
        };
        assert!(err.to_string().contains("expects 12"));
    }
}
