//! Error types for tasar
//!
//! Two error families exist, matching the serving contract:
//!
//! - **Validation errors** are request-scoped (unknown category, missing
//!   field, wrong type). The handler reports them in the response body and
//!   the process keeps serving.
//! - **Artifact errors** occur while loading the fitted transformer and
//!   predictor files. They are startup-fatal: the process must not begin
//!   serving with a partial or mismatched bundle.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for all tasar operations
#[derive(Debug, Error)]
pub enum TasarError {
    /// Categorical value absent from the fitted label-encoder vocabulary
    #[error("Unknown category for {field}: '{value}'")]
    UnknownCategory {
        /// Request field that carried the value
        field: &'static str,
        /// The unrecognized value
        value: String,
    },

    /// Request payload missing a field or carrying a wrong-typed value
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Artifact file could not be read
    #[error("Failed to read artifact {}: {source}", path.display())]
    ArtifactIo {
        /// Path of the artifact that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Artifact file was read but its contents are malformed
    #[error("Malformed artifact {}: {detail}", path.display())]
    ArtifactFormat {
        /// Path of the offending artifact
        path: PathBuf,
        /// What was wrong with it
        detail: String,
    },

    /// Manifest schema does not match what this binary expects
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Bad serve or CLI configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Predictor rejected the feature vector (dimension mismatch, corrupt tree)
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Transport or server-side failure reported by a remote instance
    #[error("Remote prediction failed: {0}")]
    Remote(String),

    /// Generic I/O error outside artifact loading (sockets, payload files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TasarError {
    /// Whether this error is request-scoped and belongs in an error
    /// response body rather than aborting the process.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory { .. } | Self::InvalidPayload(_) | Self::Inference(_)
        )
    }
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TasarError>;
