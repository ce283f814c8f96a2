//! HTTP client for remote prediction
//!
//! Posts the same JSON payload the server consumes and decodes either
//! terminal body: a prediction, or the error envelope. Backs
//! `tasar predict --url`.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};

use crate::api::{ErrorResponse, PredictionResponse};
use crate::error::{Result, TasarError};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to one running prediction server
pub struct PredictionClient {
    client: Client,
    base_url: String,
}

impl PredictionClient {
    /// Create a client for a server base URL, e.g. `http://127.0.0.1:8000`.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                TasarError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The base URL requests are issued against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a payload to `/price_prediction` and decode the outcome.
    ///
    /// The server reports validation failures inside a 200 body by default,
    /// so the error envelope is detected by shape, not by status code.
    ///
    /// # Errors
    ///
    /// `Remote` for transport failures, server-reported errors, and bodies
    /// that decode as neither terminal shape.
    pub async fn predict(&self, payload: &serde_json::Value) -> Result<PredictionResponse> {
        let url = format!("{}/price_prediction", self.base_url);
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TasarError::Remote(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TasarError::Remote(format!("Failed to parse response body: {e}")))?;

        decode_body(status, &url, body)
    }
}

fn decode_body(
    status: StatusCode,
    url: &str,
    body: serde_json::Value,
) -> Result<PredictionResponse> {
    if body.get("error").is_some() {
        let envelope: ErrorResponse = serde_json::from_value(body)
            .map_err(|e| TasarError::Remote(format!("Malformed error body: {e}")))?;
        warn!("server reported: {}", envelope.error);
        return Err(TasarError::Remote(envelope.error));
    }
    if !status.is_success() {
        return Err(TasarError::Remote(format!("HTTP {status} from {url}")));
    }
    serde_json::from_value(body)
        .map_err(|e| TasarError::Remote(format!("Malformed prediction body: {e}")))
}
