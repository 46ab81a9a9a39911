//! HTTP API for price inference
//!
//! Provides REST endpoints for rent-price prediction using axum.
//!
//! ## Endpoints
//!
//! - `GET /` - Liveness banner
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus-formatted metrics
//! - `POST /prever` - Predict a price from a JSON property record
//! - `POST /predict` - Alias of `/prever`
//!
//! ## Example
//!
//! ```rust,ignore
//! use prever::api::{create_router, AppState};
//!
//! let state = AppState::new(context);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```
//!
//! Error mapping: validation problems are 400 with the full field list,
//! a missing/corrupt model is 503, anything else is a generic 500 whose
//! detail is logged server-side only.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    align::{self, FeatureMode},
    context::ModelContext,
    error::PreverError,
    metrics::MetricsCollector,
    model::Regressor,
    postprocess,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Model/schema context, loaded lazily with retry-once semantics
    context: Arc<ModelContext>,
    /// Metrics collector for monitoring
    metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Create new application state around a model context
    #[must_use]
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self {
            context,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Metrics collector handle
    #[must_use]
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Crate version
    pub version: String,
    /// True once the model artifact has loaded
    pub model_loaded: bool,
}

/// Successful prediction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Echoed usable area from the request
    pub area: f64,
    /// Echoed bedroom count from the request
    pub quartos: i64,
    /// Predicted price, rounded to 2 decimals, never negative
    pub preco_previsto: f64,
    /// Predicted price formatted as Brazilian currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preco_formatado: Option<String>,
    /// Non-fatal alignment caveats (unknown categories)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error summary
    pub error: String,
    /// Per-field problems for validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/prever", post(predict_handler))
        .route("/predict", post(predict_handler))
        .with_state(state)
}

async fn home_handler() -> &'static str {
    "O Oráculo das Casas está ONLINE!"
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        model_loaded: state.context.is_loaded(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.to_prometheus()
}

/// Prediction handler (`/prever`, `/predict`)
///
/// Parses the raw JSON record, aligns it with the model's expected input,
/// predicts, and post-processes the scalar. The core never lets a fault
/// escape: every failure is mapped to a status code here.
async fn predict_handler(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    let start = Instant::now();

    let artifacts = state
        .context
        .acquire()
        .map_err(|e| reject(&state, e))?;

    let alignment = align::align(&payload, &artifacts.mode).map_err(|e| reject(&state, e))?;

    let mut warnings = Vec::with_capacity(alignment.caveats.len());
    for caveat in &alignment.caveats {
        log::warn!("{caveat}");
        state.metrics.record_unknown_category();
        warnings.push(caveat.to_string());
    }

    let raw = artifacts
        .model
        .predict(&alignment.vector)
        .map_err(|e| reject(&state, e))?;
    let price = postprocess::finalize_price(raw).map_err(|e| reject(&state, e))?;

    // Legacy deployments predate the rental formatting contract.
    let formatted = match artifacts.mode {
        FeatureMode::Legacy => None,
        _ => Some(postprocess::format_brl(price)),
    };

    let (area, quartos) = align::echo_fields(&payload);
    state.metrics.record_success(start.elapsed());

    Ok(Json(PredictResponse {
        area,
        quartos,
        preco_previsto: price,
        preco_formatado: formatted,
        warnings,
    }))
}

/// Map a core error to a transport response and record it
fn reject(state: &AppState, err: PreverError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        PreverError::Validation(errors) => {
            state.metrics.record_validation_rejection();
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "validation failed".to_string(),
                    details: errors.iter().map(ToString::to_string).collect(),
                }),
            )
        },
        PreverError::ModelUnavailable { reason } => {
            state.metrics.record_failure();
            log::error!("model unavailable: {reason}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "model unavailable".to_string(),
                    details: Vec::new(),
                }),
            )
        },
        other => {
            state.metrics.record_failure();
            log::error!("internal error: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal server error".to_string(),
                    details: Vec::new(),
                }),
            )
        },
    }
}
