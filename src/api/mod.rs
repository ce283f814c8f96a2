//! HTTP serving layer
//!
//! One handler per endpoint over a shared immutable [`AppState`]. The
//! prediction handler has exactly two terminal states: a prediction was
//! produced, or the request failed validation and the body carries the
//! triggering message. Nothing in here retries or partially succeeds.
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/price_prediction` | Encode features and predict a price |
//! | GET | `/health` | Liveness plus model name |
//! | GET | `/metrics` | Prometheus text format |
//! | GET | `/model` | Predictor kind, capabilities, column contract |
//! | GET | `/vocabulary` | Known categories for form clients |

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactBundle;
use crate::encoder::ConditionMapping;
use crate::error::{Result, TasarError};
use crate::explain::{self, FeatureImpact};
use crate::metrics::MetricsCollector;
use crate::pipeline::PredictionRequest;
use crate::predictor::Capability;

/// Confidence reported when the predictor exposes no probabilities
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Remediation hint carried by every error body. Deployed form clients
/// display this string verbatim; treat it as wire format.
pub const VALIDATION_HINT: &str = "Vérifiez que tous les champs sont correctement remplis";

/// Application state shared across handlers
///
/// Everything inside is loaded once at startup and never mutated; clones
/// are cheap handle copies.
#[derive(Clone)]
pub struct AppState {
    /// Loaded artifact bundle (pipeline, predictor, metadata)
    bundle: Arc<ArtifactBundle>,
    /// Metrics collector for monitoring
    metrics: Arc<MetricsCollector>,
    /// Report validation failures as 422 instead of the compatible 200
    strict_status: bool,
}

impl AppState {
    /// Wrap a loaded bundle for serving
    #[must_use]
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
            metrics: Arc::new(MetricsCollector::new()),
            strict_status: false,
        }
    }

    /// Switch validation failures to HTTP 422.
    ///
    /// The default keeps the always-200 contract existing clients parse;
    /// strict status is opt-in per deployment.
    #[must_use]
    pub fn with_strict_status(mut self, strict: bool) -> Self {
        self.strict_status = strict;
        self
    }

    /// The loaded artifact bundle
    #[must_use]
    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// The shared metrics collector
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

/// Successful prediction body
///
/// `prediction` is a one-element array; clients index `[0]`. The impact
/// labels are flattened alongside, so the body reads
/// `{"prediction": [..], "confidence": .., "year_impact": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Predicted price in MAD, wrapped in a one-element array
    pub prediction: Vec<f64>,
    /// Max class probability when available, else [`DEFAULT_CONFIDENCE`]
    pub confidence: f64,
    /// Coarse impact labels for the top-ranked features
    #[serde(flatten)]
    pub impact: FeatureImpact,
    /// Per-class probabilities when the predictor produces them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

/// Error body for failed predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong, in the words of the failing stage
    pub error: String,
    /// Constant remediation hint, [`VALIDATION_HINT`]
    pub details: String,
}

impl ErrorResponse {
    /// Build an error body around a message
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: VALIDATION_HINT.to_string(),
        }
    }
}

/// Health check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves
    pub status: String,
    /// Crate version
    pub version: String,
    /// Name of the loaded model bundle
    pub model: String,
}

/// Model metadata body for `/model`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Model bundle name
    pub name: String,
    /// Artifact schema version
    pub schema_version: u32,
    /// Column order the predictor was trained on
    pub feature_order: Vec<String>,
    /// Predictor kind tag
    pub kind: String,
    /// Abilities the predictor exposes
    pub capabilities: Vec<Capability>,
}

/// Vocabulary body for `/vocabulary`
///
/// Lets form clients populate their choices from the serving process
/// instead of reading artifact files directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyResponse {
    /// Brands known to the target encoder
    pub brands: Vec<String>,
    /// Models known to the target encoder
    pub models: Vec<String>,
    /// Origins known to the target encoder
    pub origins: Vec<String>,
    /// Gearbox vocabulary, in code order
    pub gearbox: Vec<String>,
    /// Fuel-type vocabulary, in code order
    pub fuel_types: Vec<String>,
    /// Region vocabulary, in code order
    pub regions: Vec<String>,
    /// Condition display label to ordinal code
    pub condition_mapping: ConditionMapping,
}

/// Run the full decode, encode, predict, explain sequence against a loaded
/// bundle. Shared by the HTTP handler and offline CLI prediction so both
/// produce byte-identical bodies.
///
/// # Errors
///
/// `InvalidPayload` when the body does not decode into a request,
/// `UnknownCategory` for out-of-vocabulary values, `Inference` when the
/// predictor rejects the vector. All are request-scoped.
pub fn evaluate(bundle: &ArtifactBundle, payload: serde_json::Value) -> Result<PredictionResponse> {
    let request: PredictionRequest =
        serde_json::from_value(payload).map_err(|e| TasarError::InvalidPayload(e.to_string()))?;
    let features = bundle.pipeline.encode(&request)?;
    let price = bundle.predictor.predict(&features)?;

    let probabilities = bundle.predictor.probabilities(&features);
    let confidence = probabilities
        .as_ref()
        .and_then(|p| p.iter().copied().reduce(f64::max))
        .unwrap_or(DEFAULT_CONFIDENCE);
    let impact = bundle
        .predictor
        .importances()
        .map(explain::assess)
        .unwrap_or_default();

    Ok(PredictionResponse {
        prediction: vec![price],
        confidence,
        impact,
        probabilities,
    })
}

/// Create the axum router with all endpoints
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/price_prediction", post(predict_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/model", get(model_handler))
        .route("/vocabulary", get(vocabulary_handler))
        .with_state(state)
}

/// ISO 8601 timestamp for request log records
fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Prediction handler (/price_prediction)
///
/// Decoding to `serde_json::Value` first keeps body-shape failures inside
/// the error envelope; only unparseable JSON is rejected at the transport
/// level (400) before this handler sees it.
async fn predict_handler(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    match evaluate(&state.bundle, payload) {
        Ok(response) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            state.metrics.record_success(start.elapsed());
            info!(
                "ts={} request_id={request_id} status=ok latency_ms={latency_ms:.2}",
                timestamp()
            );
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(err) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            state.metrics.record_validation_failure();
            warn!(
                "ts={} request_id={request_id} status=error latency_ms={latency_ms:.2} error=\"{err}\"",
                timestamp()
            );
            let status = if state.strict_status {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::OK
            };
            (status, Json(ErrorResponse::new(err.to_string()))).into_response()
        },
    }
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        model: state.bundle.manifest.name.clone(),
    })
}

/// Metrics handler, Prometheus text format
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.to_prometheus()
}

/// Model metadata handler
async fn model_handler(State(state): State<AppState>) -> Json<ModelResponse> {
    let bundle = &state.bundle;
    Json(ModelResponse {
        name: bundle.manifest.name.clone(),
        schema_version: bundle.manifest.schema_version,
        feature_order: bundle.manifest.feature_order.clone(),
        kind: bundle.predictor.kind().to_string(),
        capabilities: bundle.predictor.capabilities().to_vec(),
    })
}

/// Vocabulary handler
async fn vocabulary_handler(State(state): State<AppState>) -> Json<VocabularyResponse> {
    let bundle = &state.bundle;
    let target = bundle.pipeline.target_encoder();
    Json(VocabularyResponse {
        brands: target.categories("brand"),
        models: target.categories("model"),
        origins: target.categories("origin"),
        gearbox: bundle.pipeline.gearbox_classes().to_vec(),
        fuel_types: bundle.pipeline.fuel_type_classes().to_vec(),
        regions: bundle.pipeline.region_classes().to_vec(),
        condition_mapping: bundle.condition_mapping.clone(),
    })
}
