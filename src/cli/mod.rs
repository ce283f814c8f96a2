//! CLI command implementations
//!
//! This module contains all the business logic for CLI commands,
//! extracted from main.rs for testability.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;

use crate::api::{create_router, evaluate, AppState};
use crate::artifact::{resolve_artifact_dir, ArtifactBundle};
use crate::client::PredictionClient;
use crate::error::{Result, TasarError};

/// tasar - used-vehicle price inference server
///
/// Serves price predictions from pre-trained model artifacts behind a
/// small REST API, and predicts offline from the same artifacts.
#[derive(Parser)]
#[command(name = "tasar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the prediction server
    ///
    /// Examples:
    ///   tasar serve --artifacts demos/artifacts
    ///   tasar serve --artifacts /srv/models --port 8000 --strict-status
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Artifact directory containing manifest.json
        #[arg(short, long)]
        artifacts: String,

        /// Report validation failures as HTTP 422 instead of 200
        #[arg(long)]
        strict_status: bool,
    },
    /// Load and validate an artifact bundle, print a summary
    ///
    /// Examples:
    ///   tasar check --artifacts demos/artifacts
    Check {
        /// Artifact directory containing manifest.json
        #[arg(short, long)]
        artifacts: String,
    },
    /// Predict a price for a JSON payload, offline or against a server
    ///
    /// Examples:
    ///   tasar predict payload.json --artifacts demos/artifacts
    ///   tasar predict payload.json --url http://127.0.0.1:8000
    Predict {
        /// Payload file (JSON object with the request fields)
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Artifact directory for offline prediction
        #[arg(short, long)]
        artifacts: Option<String>,

        /// Base URL of a running server
        #[arg(long, conflicts_with = "artifacts")]
        url: Option<String>,
    },
    /// Show version and configuration info
    Info,
}

/// Configuration for the serve command
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Host to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Artifact directory containing manifest.json
    pub artifacts: String,
    /// Report validation failures as HTTP 422 instead of 200
    pub strict_status: bool,
}

/// Main CLI entrypoint, dispatches commands to handlers
///
/// # Errors
///
/// Propagates handler failures; `main` prints them and exits non-zero.
pub async fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            artifacts,
            strict_status,
        } => {
            handle_serve(ServeConfig {
                host,
                port,
                artifacts,
                strict_status,
            })
            .await
        },
        Commands::Check { artifacts } => handle_check(&artifacts),
        Commands::Predict {
            payload,
            artifacts,
            url,
        } => handle_predict(&payload, artifacts.as_deref(), url.as_deref()).await,
        Commands::Info => {
            print_info();
            Ok(())
        },
    }
}

/// Load artifacts and build the application state without binding.
///
/// Extracted from `handle_serve` so bundle loading and state construction
/// are testable without a socket.
///
/// # Errors
///
/// Any artifact loading or validation failure; all are startup-fatal.
pub fn prepare_serve_state(config: &ServeConfig) -> Result<AppState> {
    let dir = resolve_artifact_dir(&config.artifacts)?;
    let bundle = ArtifactBundle::load(&dir)?;

    println!("Loaded model bundle '{}'", bundle.manifest.name);
    println!(
        "  Predictor: {} ({} features)",
        bundle.predictor.kind(),
        bundle.predictor.n_features()
    );
    println!("  Schema version: {}", bundle.manifest.schema_version);

    Ok(AppState::new(bundle).with_strict_status(config.strict_status))
}

/// Start the prediction server
///
/// # Errors
///
/// Artifact loading failures, bind failures, and fatal serve errors.
pub async fn handle_serve(config: ServeConfig) -> Result<()> {
    let state = prepare_serve_state(&config)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!();
    println!("Server listening on http://{addr}");
    println!();
    println!("Endpoints:");
    println!("  POST /price_prediction - Predict a price");
    println!("  GET  /health           - Health check");
    println!("  GET  /metrics          - Prometheus metrics");
    println!("  GET  /model            - Model metadata");
    println!("  GET  /vocabulary       - Known categories");
    println!();
    println!("Example:");
    println!("  curl http://{addr}/health");
    println!();
    info!("serving on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Load and validate a bundle, printing a deploy-time summary
///
/// # Errors
///
/// Any artifact loading or validation failure.
pub fn handle_check(artifacts: &str) -> Result<()> {
    let dir = resolve_artifact_dir(artifacts)?;
    let bundle = ArtifactBundle::load(&dir)?;
    let target = bundle.pipeline.target_encoder();
    let capabilities: Vec<String> = bundle
        .predictor
        .capabilities()
        .iter()
        .map(ToString::to_string)
        .collect();

    println!("Artifact bundle OK");
    println!("  Name:            {}", bundle.manifest.name);
    println!("  Schema version:  {}", bundle.manifest.schema_version);
    println!(
        "  Feature order:   {}",
        bundle.manifest.feature_order.join(", ")
    );
    println!(
        "  Predictor:       {} ({} features)",
        bundle.predictor.kind(),
        bundle.predictor.n_features()
    );
    println!("  Capabilities:    {}", capabilities.join(", "));
    println!(
        "  Gearbox classes: {}",
        bundle.pipeline.gearbox_classes().len()
    );
    println!(
        "  Fuel types:      {}",
        bundle.pipeline.fuel_type_classes().len()
    );
    println!("  Regions:         {}", bundle.pipeline.region_classes().len());
    println!("  Brands:          {}", target.categories("brand").len());
    println!("  Models:          {}", target.categories("model").len());
    println!("  Origins:         {}", target.categories("origin").len());
    println!("  Conditions:      {}", bundle.condition_mapping.len());

    Ok(())
}

/// Predict a price for one payload file
///
/// # Errors
///
/// Unreadable or malformed payload files, artifact failures in offline
/// mode, transport or server-reported failures in remote mode.
pub async fn handle_predict(
    payload_path: &Path,
    artifacts: Option<&str>,
    url: Option<&str>,
) -> Result<()> {
    let data = std::fs::read_to_string(payload_path)?;
    let payload: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| TasarError::InvalidPayload(format!("payload file: {e}")))?;

    let response = match (artifacts, url) {
        (Some(artifacts), None) => {
            let dir = resolve_artifact_dir(artifacts)?;
            let bundle = ArtifactBundle::load(&dir)?;
            evaluate(&bundle, payload)?
        },
        (None, Some(url)) => PredictionClient::new(url)?.predict(&payload).await?,
        _ => {
            eprintln!("Error: Either --artifacts or --url must be specified");
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  tasar predict payload.json --artifacts demos/artifacts   # offline");
            eprintln!("  tasar predict payload.json --url http://127.0.0.1:8000   # remote");
            std::process::exit(1);
        },
    };

    let rendered =
        serde_json::to_string_pretty(&response).expect("response serializes to JSON");
    println!("{rendered}");
    Ok(())
}

/// Print version and feature summary
pub fn print_info() {
    println!("tasar v{}", crate::VERSION);
    println!("Used-vehicle price inference server");
    println!();
    println!("Features:");
    println!("  - Reproducible feature encoding (label, target, standard scaling)");
    println!("  - Tree-ensemble and linear predictor artifacts with load-time validation");
    println!("  - REST API: /price_prediction, /health, /metrics, /model, /vocabulary");
    println!("  - Offline and remote prediction from the CLI");
}
