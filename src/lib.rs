//! # Prever
//!
//! Rent price estimation for residential listings: an offline
//! linear-regression trainer plus an HTTP serving shell.
//!
//! Prever (Portuguese: "to predict") centers on one contract: feature
//! alignment. A raw, loosely-structured JSON record is reconciled with the
//! exact ordered feature vector the trained model expects: one-hot column
//! lookups, alias resolution, default filling, numeric coercion, and
//! negative-price clamping.
//!
//! ## Example
//!
//! ```rust
//! use prever::align::{align, FeatureMode};
//!
//! let payload = serde_json::from_str(r#"{"area": 120, "quartos": 3}"#).unwrap();
//! let result = align(&payload, &FeatureMode::Legacy).unwrap();
//! assert_eq!(result.vector, vec![120.0, 3.0]);
//! ```
//!
//! ## Architecture
//!
//! - Offline: `train` reads a listings export, fits the regressor, and
//!   emits the model / columns / metadata artifacts.
//! - Serving: `context` loads the artifacts once (with retry-once
//!   self-healing), `align` builds the vector, the model predicts, and
//!   `postprocess` applies the business rules before `api` responds.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for metrics/statistics is acceptable
#![allow(clippy::cast_possible_truncation)] // latency micros and split sizes fit comfortably
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::float_cmp)] // exact comparisons are intentional in tests

pub mod align;
pub mod api;
/// Process-lifetime model/schema context and readiness state machine
pub mod context;
pub mod error;
pub mod metrics;
pub mod model;
/// Business-rule post-processing of raw predictions
pub mod postprocess;
pub mod schema;
/// Synthetic listings generator for demos and smoke tests
pub mod synth;
/// Offline training pipeline (cleaning, encoding, OLS fit, artifact export)
pub mod train;

// Re-exports for convenience
pub use error::{PreverError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
