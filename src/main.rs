//! Prever CLI - rent price inference service
//!
//! # Commands
//!
//! - `serve` - Start the inference server
//! - `train` - Train a model from a listings export
//! - `check` - Load artifacts and run a sample prediction
//! - `synth` - Generate a synthetic listings export

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use prever::{
    api::{create_router, AppState},
    context::{ArtifactPaths, ModePolicy, ModelContext},
    error::{PreverError, Result},
    postprocess, synth,
    train::{self, TrainConfig},
};

/// Prever - rent price estimation from property attributes
///
/// Trains a linear-regression model offline and serves predictions over a
/// minimal HTTP endpoint.
#[derive(Parser)]
#[command(name = "prever")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the inference server
    ///
    /// Examples:
    ///   prever serve
    ///   prever serve --port 8080 --artifacts ./models
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Directory holding the trainer artifacts
        #[arg(short, long, default_value = "models")]
        artifacts: PathBuf,

        /// Serve the fixed [area, quartos] contract, ignoring the schema artifact
        #[arg(long, conflicts_with = "strict")]
        legacy: bool,

        /// Treat every schema column as a literal required payload field
        #[arg(long)]
        strict: bool,
    },
    /// Train a model from a semicolon-delimited listings export
    Train {
        /// Listings CSV path
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Output directory for the serving artifacts
        #[arg(short, long, default_value = "models")]
        out: PathBuf,

        /// Held-out fraction for evaluation
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Load the artifacts and run a sample prediction
    Check {
        /// Directory holding the trainer artifacts
        #[arg(short, long, default_value = "models")]
        artifacts: PathBuf,
    },
    /// Generate a synthetic listings export
    Synth {
        /// Output CSV path
        #[arg(short, long, default_value = "dataZAP.csv")]
        out: PathBuf,

        /// Number of rows
        #[arg(short, long, default_value = "150")]
        rows: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            artifacts,
            legacy,
            strict,
        } => {
            let policy = if legacy {
                ModePolicy::ForceLegacy
            } else if strict {
                ModePolicy::ForceStrict
            } else {
                ModePolicy::Auto
            };
            serve(&host, port, &artifacts, policy).await
        },
        Commands::Train {
            data,
            out,
            test_fraction,
            seed,
        } => run_train(data, out, test_fraction, seed),
        Commands::Check { artifacts } => run_check(&artifacts),
        Commands::Synth { out, rows, seed } => {
            synth::generate_file(&synth::SynthConfig { rows, seed }, &out)?;
            println!("Wrote {rows} synthetic listings to {}", out.display());
            Ok(())
        },
    }
}

async fn serve(host: &str, port: u16, artifacts: &std::path::Path, policy: ModePolicy) -> Result<()> {
    println!("Starting prever inference server...");

    let context = Arc::new(ModelContext::new(ArtifactPaths::in_dir(artifacts), policy));

    // Warm the context up front; on failure each request retries the load
    // once.
    if let Err(err) = context.reload() {
        log::error!("startup load failed, serving degraded: {err}");
    }

    let state = AppState::new(context);
    let app = create_router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| PreverError::Internal(format!("invalid address: {e}")))?;

    println!("Server listening on http://{addr}");
    println!();
    println!("Endpoints:");
    println!("  GET  /health  - Health check");
    println!("  GET  /metrics - Prometheus metrics");
    println!("  POST /prever  - Predict a price");
    println!();
    println!("Example:");
    println!("  curl -X POST http://{addr}/prever -H 'Content-Type: application/json' \\");
    println!("       -d '{{\"area\": 120, \"quartos\": 3}}'");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| PreverError::Internal(format!("server error: {e}")))?;

    Ok(())
}

fn run_train(data: PathBuf, out: PathBuf, test_fraction: f64, seed: u64) -> Result<()> {
    let config = TrainConfig {
        csv_path: data,
        out_dir: out,
        test_fraction,
        seed,
        ..TrainConfig::default()
    };

    println!("Training from {}...", config.csv_path.display());
    let report = train::run(&config)?;

    println!();
    println!("--- Release Candidate {} ---", config.version);
    println!("Rows: {} read, {} kept", report.rows_read, report.rows_kept);
    println!("Features: {}", report.n_features);
    println!("R²: {:.4}", report.r2);
    println!("RMSE: {:.4}", report.rmse);
    println!(
        "Price range: {:.2} - {:.2}",
        report.price_range.min, report.price_range.max
    );
    println!("Artifacts written to {}", config.out_dir.display());

    Ok(())
}

fn run_check(artifacts: &std::path::Path) -> Result<()> {
    let context = ModelContext::new(ArtifactPaths::in_dir(artifacts), ModePolicy::Auto);
    let loaded = context.acquire()?;

    if let Some(meta) = &loaded.metadata {
        println!("Model {} with {} features", meta.version, meta.n_features);
    } else {
        println!("Model loaded (no metadata artifact)");
    }
    println!("Alignment mode: {}", loaded.mode.label());

    let sample: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(r#"{"area": 75, "quartos": 2, "banheiros": 1, "vagas": 1}"#)
            .map_err(|e| PreverError::Internal(format!("sample payload: {e}")))?;
    let alignment = prever::align::align(&sample, &loaded.mode)?;
    let raw = prever::model::Regressor::predict(&loaded.model, &alignment.vector)?;
    let price = postprocess::finalize_price(raw)?;

    println!(
        "Sample prediction (75m², 2 quartos): {}",
        postprocess::format_brl(price)
    );
    Ok(())
}
