//! Artifact manifest and bundle loading
//!
//! A model deployment is a directory containing `manifest.json` plus the
//! JSON artifact files it names: one predictor, one scaler, three label
//! encoders, the target-encoding table, and the condition mapping.
//!
//! Loading is one-shot at startup. Any missing file, parse failure, schema
//! version drift, or feature-order drift aborts before the server binds;
//! the process never serves from a partial or mismatched bundle.
//!
//! ## Manifest layout
//!
//! ```json
//! {
//!   "name": "vehicle-price",
//!   "schema_version": 1,
//!   "feature_order": ["mileage", "brand", "..."],
//!   "predictor": "predictor.json",
//!   "scaler": "scaler.json",
//!   "gearbox_encoder": "gearbox_encoder.json",
//!   "fuel_type_encoder": "fuel_type_encoder.json",
//!   "region_encoder": "region_encoder.json",
//!   "target_encoder": "target_encoder.json",
//!   "condition_mapping": "condition_mapping.json"
//! }
//! ```
//!
//! Artifact paths are resolved relative to the manifest's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::encoder::{ConditionMapping, LabelEncoder, StandardScaler, TargetEncoder};
use crate::error::{Result, TasarError};
use crate::pipeline::{FeaturePipeline, FEATURE_ORDER};
use crate::predictor::{load_predictor, Predictor};

/// Manifest schema version this binary understands
pub const SCHEMA_VERSION: u32 = 1;

/// Describes one deployable artifact set
///
/// `feature_order` and `schema_version` make the column contract explicit:
/// a bundle fit against a different layout is rejected at load time instead
/// of silently producing garbage predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Human-readable model name, reported by `/health` and `/model`
    pub name: String,
    /// Schema version the artifacts were written under
    pub schema_version: u32,
    /// Column order the predictor was trained on
    pub feature_order: Vec<String>,
    /// Predictor artifact file
    pub predictor: String,
    /// Scaler artifact file
    pub scaler: String,
    /// Gearbox label-encoder artifact file
    pub gearbox_encoder: String,
    /// Fuel-type label-encoder artifact file
    pub fuel_type_encoder: String,
    /// Region label-encoder artifact file
    pub region_encoder: String,
    /// Target-encoding table artifact file
    pub target_encoder: String,
    /// Condition display-label mapping artifact file
    pub condition_mapping: String,
}

impl ArtifactManifest {
    /// Check the manifest against this binary's schema expectations.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` when the version differs or the feature order
    /// deviates from [`FEATURE_ORDER`] at any position.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(TasarError::SchemaMismatch(format!(
                "artifact schema version {} but this binary expects {}",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.feature_order.len() != FEATURE_ORDER.len() {
            return Err(TasarError::SchemaMismatch(format!(
                "feature order lists {} columns, expected {}",
                self.feature_order.len(),
                FEATURE_ORDER.len()
            )));
        }
        for (position, (got, expected)) in self
            .feature_order
            .iter()
            .zip(FEATURE_ORDER.iter())
            .enumerate()
        {
            if got != expected {
                return Err(TasarError::SchemaMismatch(format!(
                    "feature order differs at position {position}: artifact has '{got}', expected '{expected}'"
                )));
            }
        }
        Ok(())
    }
}

/// Everything loaded from one artifact directory, ready to serve
///
/// Built once in `main`, wrapped in an `Arc`, and shared read-only across
/// request handlers.
pub struct ArtifactBundle {
    /// The validated manifest the bundle was loaded from
    pub manifest: ArtifactManifest,
    /// Fitted encode/scale/concat pipeline
    pub pipeline: FeaturePipeline,
    /// Trained predictor behind the capability interface
    pub predictor: Box<dyn Predictor>,
    /// Condition display label to ordinal code, for form clients
    pub condition_mapping: ConditionMapping,
}

impl ArtifactBundle {
    /// Load and validate a full artifact directory.
    ///
    /// # Errors
    ///
    /// Every failure here is startup-fatal: `ArtifactIo` for unreadable
    /// files, `ArtifactFormat` for malformed contents, `SchemaMismatch`
    /// for version or column drift, `InvalidConfiguration` when the
    /// transformers disagree with each other on widths.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest: ArtifactManifest = load_json(&dir.join("manifest.json"))?;
        manifest.validate()?;

        let scaler = load_scaler(&dir.join(&manifest.scaler))?;
        let gearbox = load_label_encoder(&dir.join(&manifest.gearbox_encoder))?;
        let fuel_type = load_label_encoder(&dir.join(&manifest.fuel_type_encoder))?;
        let region = load_label_encoder(&dir.join(&manifest.region_encoder))?;
        let target: TargetEncoder = load_json(&dir.join(&manifest.target_encoder))?;
        let condition_mapping: ConditionMapping =
            load_json(&dir.join(&manifest.condition_mapping))?;

        let predictor = load_predictor(&dir.join(&manifest.predictor))?;
        if predictor.n_features() != manifest.feature_order.len() {
            return Err(TasarError::SchemaMismatch(format!(
                "predictor was trained on {} features, manifest lists {}",
                predictor.n_features(),
                manifest.feature_order.len()
            )));
        }

        let pipeline = FeaturePipeline::new(gearbox, fuel_type, region, target, scaler)?;

        Ok(Self {
            manifest,
            pipeline,
            predictor,
            condition_mapping,
        })
    }
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("name", &self.manifest.name)
            .field("schema_version", &self.manifest.schema_version)
            .field("predictor_kind", &self.predictor.kind())
            .finish_non_exhaustive()
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|source| TasarError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|e| TasarError::ArtifactFormat {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Raw scaler artifact, constructed through [`StandardScaler::new`] so the
/// non-zero-scale invariant is enforced on load rather than first use.
#[derive(Deserialize)]
struct RawScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

fn load_scaler(path: &Path) -> Result<StandardScaler> {
    let raw: RawScaler = load_json(path)?;
    StandardScaler::new(raw.mean, raw.scale).map_err(|e| TasarError::ArtifactFormat {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[derive(Deserialize)]
struct RawClasses {
    classes: Vec<String>,
}

fn load_label_encoder(path: &Path) -> Result<LabelEncoder> {
    let raw: RawClasses = load_json(path)?;
    if raw.classes.is_empty() {
        return Err(TasarError::ArtifactFormat {
            path: path.to_path_buf(),
            detail: "vocabulary is empty".to_string(),
        });
    }
    Ok(LabelEncoder::new(raw.classes))
}

/// Resolve an artifact directory argument, rejecting paths that do not
/// exist or are not directories before any file is opened.
pub fn resolve_artifact_dir(dir: &str) -> Result<PathBuf> {
    let path = PathBuf::from(dir);
    if !path.is_dir() {
        return Err(TasarError::InvalidConfiguration(format!(
            "artifact directory '{dir}' does not exist or is not a directory"
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a minimal but complete artifact directory.
    fn write_fixture(dir: &Path) {
        let manifest = serde_json::json!({
            "name": "vehicle-price-test",
            "schema_version": SCHEMA_VERSION,
            "feature_order": FEATURE_ORDER,
            "predictor": "predictor.json",
            "scaler": "scaler.json",
            "gearbox_encoder": "gearbox_encoder.json",
            "fuel_type_encoder": "fuel_type_encoder.json",
            "region_encoder": "region_encoder.json",
            "target_encoder": "target_encoder.json",
            "condition_mapping": "condition_mapping.json"
        });
        fs::write(dir.join("manifest.json"), manifest.to_string()).expect("test");

        fs::write(
            dir.join("predictor.json"),
            serde_json::json!({
                "kind": "linear",
                "weights": [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                "intercept": 0.0
            })
            .to_string(),
        )
        .expect("test");

        fs::write(
            dir.join("scaler.json"),
            serde_json::json!({"mean": vec![0.0; 9], "scale": vec![1.0; 9]}).to_string(),
        )
        .expect("test");

        fs::write(
            dir.join("gearbox_encoder.json"),
            serde_json::json!({"classes": ["automatique", "manuelle"]}).to_string(),
        )
        .expect("test");
        fs::write(
            dir.join("fuel_type_encoder.json"),
            serde_json::json!({"classes": ["diesel", "essence"]}).to_string(),
        )
        .expect("test");
        fs::write(
            dir.join("region_encoder.json"),
            serde_json::json!({"classes": ["Casablanca-Settat", "Rabat-Salé-Kénitra"]}).to_string(),
        )
        .expect("test");

        fs::write(
            dir.join("target_encoder.json"),
            serde_json::json!({
                "global_mean": 80000.0,
                "mappings": {
                    "brand": {"Toyota": 90000.0},
                    "model": {"Corolla": 95000.0},
                    "origin": {"WW au Maroc": 75000.0}
                }
            })
            .to_string(),
        )
        .expect("test");

        fs::write(
            dir.join("condition_mapping.json"),
            serde_json::json!({"Excellent": 5, "Neuf": 6, "Bon": 3}).to_string(),
        )
        .expect("test");
    }

    #[test]
    fn test_load_complete_bundle() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());

        let bundle = ArtifactBundle::load(dir.path()).expect("test");
        assert_eq!(bundle.manifest.name, "vehicle-price-test");
        assert_eq!(bundle.predictor.kind(), "linear");
        assert_eq!(bundle.condition_mapping.get("Neuf"), Some(&6));
        assert_eq!(bundle.pipeline.gearbox_classes().len(), 2);
    }

    #[test]
    fn test_missing_manifest_is_artifact_io() {
        let dir = tempfile::tempdir().expect("test");
        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::ArtifactIo { .. }));
    }

    #[test]
    fn test_missing_artifact_file_is_fatal() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        fs::remove_file(dir.path().join("scaler.json")).expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::ArtifactIo { .. }));
    }

    #[test]
    fn test_corrupt_json_is_artifact_format() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        fs::write(dir.path().join("target_encoder.json"), "{not json").expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::ArtifactFormat { .. }));
    }

    #[test]
    fn test_schema_version_drift_is_rejected() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        let manifest = fs::read_to_string(dir.path().join("manifest.json")).expect("test");
        let mut value: serde_json::Value = serde_json::from_str(&manifest).expect("test");
        value["schema_version"] = serde_json::json!(99);
        fs::write(dir.path().join("manifest.json"), value.to_string()).expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::SchemaMismatch(_)));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_feature_order_drift_is_rejected() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        let manifest = fs::read_to_string(dir.path().join("manifest.json")).expect("test");
        let mut value: serde_json::Value = serde_json::from_str(&manifest).expect("test");
        // Swap the first two columns.
        value["feature_order"][0] = serde_json::json!("brand");
        value["feature_order"][1] = serde_json::json!("mileage");
        fs::write(dir.path().join("manifest.json"), value.to_string()).expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("position 0"));
    }

    #[test]
    fn test_predictor_width_must_match_feature_order() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        fs::write(
            dir.path().join("predictor.json"),
            serde_json::json!({"kind": "linear", "weights": [1.0, 2.0], "intercept": 0.0})
                .to_string(),
        )
        .expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::SchemaMismatch(_)));
        assert!(err.to_string().contains("trained on 2 features"));
    }

    #[test]
    fn test_zero_scale_is_rejected_at_load() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        let mut scaler = serde_json::json!({"mean": vec![0.0; 9], "scale": vec![1.0; 9]});
        scaler["scale"][4] = serde_json::json!(0.0);
        fs::write(dir.path().join("scaler.json"), scaler.to_string()).expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::ArtifactFormat { .. }));
    }

    #[test]
    fn test_short_scaler_is_rejected() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        fs::write(
            dir.path().join("scaler.json"),
            serde_json::json!({"mean": vec![0.0; 8], "scale": vec![1.0; 8]}).to_string(),
        )
        .expect("test");

        // StandardScaler itself is consistent; the pipeline rejects the width.
        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, TasarError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_vocabulary_is_rejected() {
        let dir = tempfile::tempdir().expect("test");
        write_fixture(dir.path());
        fs::write(
            dir.path().join("gearbox_encoder.json"),
            serde_json::json!({"classes": []}).to_string(),
        )
        .expect("test");

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("vocabulary is empty"));
    }

    #[test]
    fn test_resolve_artifact_dir() {
        let dir = tempfile::tempdir().expect("test");
        let resolved =
            resolve_artifact_dir(dir.path().to_str().expect("test")).expect("test");
        assert_eq!(resolved, dir.path());

        assert!(resolve_artifact_dir("/definitely/not/a/real/dir").is_err());
    }
}
