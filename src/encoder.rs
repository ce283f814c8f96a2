//! Fitted feature transformers
//!
//! The transformers here replay tables computed during offline training;
//! nothing is fit at serving time.
//!
//! - [`LabelEncoder`]: partial mapping from a category string to its integer
//!   code. Unseen values are a user-correctable error.
//! - [`TargetEncoder`]: total mapping from a category to its smoothed mean
//!   target value, with a global-mean fallback for unseen categories.
//! - [`StandardScaler`]: fitted standardization `(x - mean) / scale` over a
//!   fixed-width block of continuous features.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TasarError};

/// Categorical label encoder replayed from offline fitting
///
/// The vocabulary order is fixed at fit time; a class's code is its index in
/// that order. Values outside the vocabulary fail with
/// [`TasarError::UnknownCategory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Ordered class vocabulary (code = index)
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Create an encoder from an ordered class list
    #[must_use]
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Map a value to its fitted integer code.
    ///
    /// `field` names the request field for the error message; the encoder
    /// itself is field-agnostic, like the artifacts it is loaded from.
    pub fn transform(&self, field: &'static str, value: &str) -> Result<u32> {
        self.classes
            .iter()
            .position(|c| c == value)
            .map(|idx| idx as u32)
            .ok_or_else(|| TasarError::UnknownCategory {
                field,
                value: value.to_string(),
            })
    }

    /// Whether a value belongs to the fitted vocabulary
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.classes.iter().any(|c| c == value)
    }

    /// The fitted vocabulary, in code order
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Vocabulary size
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when the vocabulary is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Smoothed target-encoding table replayed at serving time
///
/// Holds the per-field, per-category smoothed means computed during training
/// plus the global target mean. Lookup is total: unseen categories degrade to
/// the global mean instead of failing, so new or rare brand/model/origin
/// combinations lose specificity rather than the whole prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEncoder {
    /// Mean of the training target over all rows
    global_mean: f64,
    /// Per-field, per-category smoothed means
    mappings: HashMap<String, HashMap<String, f64>>,
}

impl TargetEncoder {
    /// Create a table from a global mean and per-field mappings
    #[must_use]
    pub fn new(global_mean: f64, mappings: HashMap<String, HashMap<String, f64>>) -> Self {
        Self {
            global_mean,
            mappings,
        }
    }

    /// Total lookup: the stored per-category value when present, the stored
    /// global mean otherwise. Never fails, never computes new statistics.
    #[must_use]
    pub fn encode(&self, field: &str, value: &str) -> f64 {
        self.mappings
            .get(field)
            .and_then(|per_category| per_category.get(value))
            .copied()
            .unwrap_or(self.global_mean)
    }

    /// The stored global mean fallback
    #[must_use]
    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Whether a category was seen during fitting for the given field
    #[must_use]
    pub fn contains(&self, field: &str, value: &str) -> bool {
        self.mappings
            .get(field)
            .is_some_and(|per_category| per_category.contains_key(value))
    }

    /// Known categories for a field, sorted for stable presentation
    #[must_use]
    pub fn categories(&self, field: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .mappings
            .get(field)
            .map(|per_category| per_category.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Fitted standardization transform
///
/// Applies `(x - mean[i]) / scale[i]` element-wise. Width is fixed at fit
/// time; inputs of any other width are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature means from fitting
    mean: Vec<f64>,
    /// Per-feature scales from fitting
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Create a scaler from fitted means and scales.
    ///
    /// Lengths must match and every scale entry must be non-zero; violations
    /// indicate a corrupt artifact.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(TasarError::InvalidConfiguration(format!(
                "scaler mean/scale length mismatch: {} vs {}",
                mean.len(),
                scale.len()
            )));
        }
        if let Some(idx) = scale.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            return Err(TasarError::InvalidConfiguration(format!(
                "scaler scale[{idx}] is not a usable divisor"
            )));
        }
        Ok(Self { mean, scale })
    }

    /// Standardize one feature block.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.mean.len() {
            return Err(TasarError::Inference(format!(
                "Invalid input dimension: got {}, expected {}",
                features.len(),
                self.mean.len()
            )));
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Number of features the scaler was fit on
    #[must_use]
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// True when the scaler covers zero features
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Ordinal display-label mapping for the `condition` field
///
/// Callers pre-map a display label (e.g. "neuf") to its integer code before
/// transmission; the service only carries this table so form clients can
/// fetch it instead of reading artifact files directly.
pub type ConditionMapping = BTreeMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;

    fn gearbox_encoder() -> LabelEncoder {
        LabelEncoder::new(vec!["automatique".to_string(), "manuelle".to_string()])
    }

    #[test]
    fn test_label_encoder_codes_are_indices() {
        let enc = gearbox_encoder();
        assert_eq!(enc.transform("gearbox", "automatique").expect("test"), 0);
        assert_eq!(enc.transform("gearbox", "manuelle").expect("test"), 1);
    }

    #[test]
    fn test_label_encoder_is_deterministic() {
        let enc = gearbox_encoder();
        let first = enc.transform("gearbox", "manuelle").expect("test");
        let second = enc.transform("gearbox", "manuelle").expect("test");
        assert_eq!(first, second);
    }

    #[test]
    fn test_label_encoder_rejects_unseen_value() {
        let enc = gearbox_encoder();
        let err = enc.transform("gearbox", "unknownBox").unwrap_err();
        match err {
            TasarError::UnknownCategory { field, value } => {
                assert_eq!(field, "gearbox");
                assert_eq!(value, "unknownBox");
            },
            other => panic!("expected UnknownCategory, got {other}"),
        }
    }

    #[test]
    fn test_label_encoder_vocabulary_accessors() {
        let enc = gearbox_encoder();
        assert_eq!(enc.len(), 2);
        assert!(!enc.is_empty());
        assert!(enc.contains("manuelle"));
        assert!(!enc.contains("séquentielle"));
        assert_eq!(enc.classes()[0], "automatique");
    }

    fn brand_table() -> TargetEncoder {
        let mut brands = HashMap::new();
        brands.insert("Toyota".to_string(), 90_200.0);
        brands.insert("Dacia".to_string(), 65_400.0);
        let mut mappings = HashMap::new();
        mappings.insert("brand".to_string(), brands);
        TargetEncoder::new(78_500.0, mappings)
    }

    #[test]
    fn test_target_encoder_known_category() {
        let table = brand_table();
        assert_eq!(table.encode("brand", "Toyota"), 90_200.0);
        assert_eq!(table.encode("brand", "Dacia"), 65_400.0);
    }

    #[test]
    fn test_target_encoder_falls_back_to_global_mean() {
        let table = brand_table();
        assert_eq!(table.encode("brand", "UnknownBrandXYZ"), 78_500.0);
        // Unknown field degrades the same way as an unknown category.
        assert_eq!(table.encode("color", "rouge"), 78_500.0);
    }

    #[test]
    fn test_target_encoder_is_total_and_idempotent() {
        let table = brand_table();
        for value in ["Toyota", "", "Dacia", "🚗", "toyota"] {
            let first = table.encode("brand", value);
            let second = table.encode("brand", value);
            assert_eq!(first, second);
        }
        // Case matters: the table stores what training saw.
        assert_eq!(table.encode("brand", "toyota"), table.global_mean());
    }

    #[test]
    fn test_target_encoder_categories_sorted() {
        let table = brand_table();
        assert_eq!(table.categories("brand"), vec!["Dacia", "Toyota"]);
        assert!(table.categories("origin").is_empty());
    }

    #[test]
    fn test_scaler_standardizes() {
        let scaler = StandardScaler::new(vec![10.0, 0.0], vec![2.0, 1.0]).expect("test");
        let out = scaler.transform(&[14.0, -3.0]).expect("test");
        assert_eq!(out, vec![2.0, -3.0]);
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::new(vec![0.0; 9], vec![1.0; 9]).expect("test");
        let err = scaler.transform(&[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("Invalid input dimension"));
    }

    #[test]
    fn test_scaler_rejects_mismatched_parameters() {
        assert!(StandardScaler::new(vec![0.0; 9], vec![1.0; 8]).is_err());
    }

    #[test]
    fn test_scaler_rejects_zero_scale() {
        let err = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("scale[1]"));
    }

    #[test]
    fn test_scaler_json_round_trip() {
        let scaler = StandardScaler::new(vec![1.5, 2.5], vec![0.5, 4.0]).expect("test");
        let json = serde_json::to_string(&scaler).expect("test");
        let parsed: StandardScaler = serde_json::from_str(&json).expect("test");
        assert_eq!(parsed.transform(&[2.0, 2.5]).expect("test"), vec![1.0, 0.0]);
    }
}
