//! End-to-end tests for the HTTP serving shell
//!
//! Drives the axum router directly with oneshot requests against artifact
//! fixtures on disk: happy-path predictions in every mode, the collect-all
//! validation contract, service-unavailable reporting, and the lazy
//! self-healing load.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use prever::api::{create_router, AppState};
use prever::context::{ArtifactPaths, ModePolicy, ModelContext};
use prever::model::LinearModel;

fn write_model(dir: &Path, intercept: f64, coefficients: &[f64]) {
    LinearModel::new(intercept, coefficients.to_vec())
        .save(&dir.join("modelo_imoveis.json"))
        .expect("save model");
}

fn write_columns(dir: &Path, columns: &[&str]) {
    let json = serde_json::to_string(columns).expect("serialize");
    fs::write(dir.join("modelo_columns.json"), json).expect("write columns");
}

fn app_for(dir: &Path, policy: ModePolicy) -> axum::Router {
    let context = Arc::new(ModelContext::new(ArtifactPaths::in_dir(dir), policy));
    create_router(AppState::new(context))
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_home_banner() {
    let dir = TempDir::new().expect("tempdir");
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ONLINE"));
}

#[tokio::test]
async fn test_health_reflects_load_state() {
    let dir = TempDir::new().expect("tempdir");
    write_model(dir.path(), 50_000.0, &[3500.0, 25_000.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model_loaded"], false);

    // A prediction triggers the lazy load; health flips.
    let (status, _) = post_json(&app, "/prever", json!({"area": 100, "quartos": 2})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/health").await;
    let health: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(health["model_loaded"], true);
}

#[tokio::test]
async fn test_legacy_prediction_echoes_inputs() {
    let dir = TempDir::new().expect("tempdir");
    // No schema artifact: legacy two-feature mode.
    write_model(dir.path(), 50_000.0, &[3500.0, 25_000.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = post_json(&app, "/prever", json!({"area": 120, "quartos": 3})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["area"], 120.0);
    assert_eq!(body["quartos"], 3);
    // 50000 + 120*3500 + 3*25000
    assert_eq!(body["preco_previsto"], 545_000.0);
    // Legacy deployments carry no currency formatting.
    assert!(body.get("preco_formatado").is_none());
}

#[tokio::test]
async fn test_aliased_prediction_with_formatting_and_warning() {
    let dir = TempDir::new().expect("tempdir");
    write_columns(
        dir.path(),
        &[
            "listing.usableAreas",
            "listing.bedrooms",
            "listing.address.city_Santos",
            "imvl_type_casas",
        ],
    );
    write_model(dir.path(), 500.0, &[10.0, 100.0, 300.0, 200.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = post_json(
        &app,
        "/prever",
        json!({"area": 70, "quartos": 2, "city": "Santos", "imvl_type": "coberturas"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 500 + 70*10 + 2*100 + 1*300
    assert_eq!(body["preco_previsto"], 1700.0);
    assert_eq!(body["preco_formatado"], "R$ 1.700,00");
    // Unknown property type is a warning, never a failure.
    let warnings = body["warnings"].as_array().expect("warnings");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().expect("str").contains("coberturas"));
}

#[tokio::test]
async fn test_predict_route_alias() {
    let dir = TempDir::new().expect("tempdir");
    write_model(dir.path(), 0.0, &[1.0, 1.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = post_json(&app, "/predict", json!({"area": 10, "quartos": 2})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preco_previsto"], 12.0);
}

#[tokio::test]
async fn test_negative_prediction_clamps_to_zero() {
    let dir = TempDir::new().expect("tempdir");
    write_model(dir.path(), -150.0, &[0.0, 0.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = post_json(&app, "/prever", json!({"area": 50, "quartos": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preco_previsto"], 0.0);
}

#[tokio::test]
async fn test_strict_mode_collects_all_errors() {
    let dir = TempDir::new().expect("tempdir");
    write_columns(dir.path(), &["area", "quartos", "banheiros", "vagas"]);
    write_model(dir.path(), 0.0, &[1.0, 1.0, 1.0, 1.0]);
    let app = app_for(dir.path(), ModePolicy::ForceStrict);

    let (status, body) = post_json(&app, "/prever", json!({"area": "notanumber"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation failed");

    let details = body["details"].as_array().expect("details");
    // One coercion failure plus three missing fields, all in one response.
    assert_eq!(details.len(), 4);
    let joined = details
        .iter()
        .map(|d| d.as_str().expect("str"))
        .collect::<Vec<_>>()
        .join(" | ");
    assert!(joined.contains("`area`"));
    assert!(joined.contains("`quartos`"));
    assert!(joined.contains("`banheiros`"));
    assert!(joined.contains("`vagas`"));
}

#[tokio::test]
async fn test_strict_mode_happy_path() {
    let dir = TempDir::new().expect("tempdir");
    write_columns(dir.path(), &["area", "quartos", "banheiros", "vagas"]);
    write_model(dir.path(), 100.0, &[2.0, 10.0, 5.0, 1.0]);
    let app = app_for(dir.path(), ModePolicy::ForceStrict);

    let (status, body) = post_json(
        &app,
        "/predict",
        json!({"area": 70, "quartos": 2, "banheiros": 1, "vagas": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 100 + 70*2 + 2*10 + 1*5 + 1*1
    assert_eq!(body["preco_previsto"], 266.0);
}

#[tokio::test]
async fn test_model_unavailable_is_503() {
    let dir = TempDir::new().expect("tempdir");
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, body) = post_json(&app, "/prever", json!({"area": 100, "quartos": 2})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "model unavailable");
    // Service-level failures stay generic: no artifact paths in the body.
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_failed_load_self_heals_when_artifacts_appear() {
    let dir = TempDir::new().expect("tempdir");
    let app = app_for(dir.path(), ModePolicy::Auto);

    let (status, _) = post_json(&app, "/prever", json!({"area": 100, "quartos": 2})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    write_model(dir.path(), 50_000.0, &[3500.0, 25_000.0]);
    let (status, body) = post_json(&app, "/prever", json!({"area": 100, "quartos": 2})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preco_previsto"], 475_000.0);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_counters() {
    let dir = TempDir::new().expect("tempdir");
    write_model(dir.path(), 0.0, &[1.0, 1.0]);
    let app = app_for(dir.path(), ModePolicy::Auto);

    post_json(&app, "/prever", json!({"area": 10, "quartos": 1})).await;
    post_json(&app, "/prever", json!({"area": "bad"})).await;

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("prever_requests_total 2"));
    assert!(body.contains("prever_requests_successful 1"));
    assert!(body.contains("prever_validation_rejections 1"));
}
