//! # Tasar
//!
//! Used-vehicle price inference server for the Moroccan resale market.
//!
//! Tasar (Spanish: "to appraise, to set a price") serves point price predictions
//! over HTTP from a versioned artifact bundle exported by an offline training
//! pipeline. The bundle carries the fitted feature transformers and the trained
//! predictor; nothing is fit at serving time.
//!
//! ## Features
//!
//! - **Wire-compatible API**: response bodies preserve the shape the deployed
//!   form client already parses, including its French impact labels
//! - **Total feature pipeline**: label encoding, smoothed target encoding and
//!   standardization replayed exactly as fitted, with typed errors for
//!   out-of-vocabulary input
//! - **Pluggable predictors**: tree ensembles and linear models behind one
//!   capability-probed trait
//! - **Offline parity**: `tasar predict` evaluates the same code path the
//!   server does, byte for byte
//!
//! ## Example
//!
//! ```rust
//! use tasar::encoder::LabelEncoder;
//!
//! let gearbox = LabelEncoder::new(vec![
//!     "automatique".to_string(),
//!     "manuelle".to_string(),
//! ]);
//!
//! // Codes are vocabulary indexes, fixed at fit time
//! assert_eq!(gearbox.transform("gearbox", "manuelle").unwrap(), 1);
//!
//! // Unseen categories are a user-correctable error, not a guess
//! assert!(gearbox.transform("gearbox", "tiptronic").is_err());
//! ```
//!
//! ## Request flow
//!
//! 1. `POST /price_prediction` with a flat JSON payload
//! 2. [`pipeline::FeaturePipeline`] encodes it into the fitted feature vector
//! 3. a [`predictor::Predictor`] scores the vector
//! 4. the handler assembles the response envelope, attaching feature impacts
//!    when the predictor exposes importances

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for metrics averages is acceptable
#![allow(clippy::cast_possible_truncation)] // u128 -> u64 for duration micros is safe
#![allow(clippy::cast_sign_loss)] // node indexes are validated non-negative before casting
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::missing_errors_doc)] // Error conditions are described in prose
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::too_many_lines)] // Some handlers are naturally long
#![allow(clippy::float_cmp)] // Allow float comparisons in tests

pub mod api;
pub mod artifact;
/// CLI command implementations (extracted for testability)
pub mod cli;
pub mod client;
pub mod encoder;
pub mod error;
/// Feature impact labelling for served predictions
///
/// Ranks predictor importances and emits the French impact labels the
/// deployed form client pattern-matches on.
pub mod explain;
pub mod metrics;
pub mod pipeline;
pub mod predictor;

// Re-exports for convenience
pub use artifact::ArtifactBundle;
pub use error::{Result, TasarError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
