//! Trained predictors and the capability interface over them
//!
//! A predictor artifact declares its implementation through a `"kind"` tag;
//! [`load_predictor`] dispatches on that tag and refuses unknown kinds
//! before the server starts taking traffic.
//!
//! ## Supported kinds
//!
//! | Kind | Struct | Capabilities |
//! |------|--------|--------------|
//! | `tree_ensemble` | [`TreeEnsemble`] | point estimate, importances |
//! | `linear` | [`LinearModel`] | point estimate |

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TasarError};

/// Optional abilities a predictor may expose beyond the point estimate
///
/// Handlers probe capabilities instead of assuming them; a predictor that
/// lacks one simply answers `None` and the response omits the derived
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Single numeric prediction (every predictor has this)
    PointEstimate,
    /// Per-feature importance vector
    Importances,
    /// Per-class probability vector
    Probabilities,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PointEstimate => write!(f, "point_estimate"),
            Self::Importances => write!(f, "importances"),
            Self::Probabilities => write!(f, "probabilities"),
        }
    }
}

/// A trained model ready to score encoded feature vectors
///
/// Implementations are immutable after loading and shared across request
/// handlers, hence the `Send + Sync` bound.
pub trait Predictor: Send + Sync {
    /// Score one encoded feature vector.
    ///
    /// # Errors
    ///
    /// Fails when the vector width differs from what the model was
    /// trained on.
    fn predict(&self, features: &[f32]) -> Result<f64>;

    /// Per-feature importances, when the model carries them
    fn importances(&self) -> Option<&[f32]> {
        None
    }

    /// Per-class probabilities for one feature vector, when the model
    /// can produce them
    fn probabilities(&self, _features: &[f32]) -> Option<Vec<f64>> {
        None
    }

    /// The abilities this predictor exposes
    fn capabilities(&self) -> &'static [Capability];

    /// The artifact kind tag this predictor was loaded from
    fn kind(&self) -> &'static str;

    /// Width of the feature vector the model was trained on
    fn n_features(&self) -> usize;
}

/// One regression tree stored as parallel node arrays
///
/// `feature[i] == -1` marks node `i` as a leaf whose contribution is
/// `value[i]`; internal nodes route to `left[i]` when
/// `x[feature[i]] <= threshold[i]`, else to `right[i]`. Child indices must
/// point forward (child > parent), so a validated tree always terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Split feature index per node, -1 for leaves
    pub feature: Vec<i32>,
    /// Split threshold per node (unused at leaves)
    pub threshold: Vec<f64>,
    /// Left child index per node (unused at leaves)
    pub left: Vec<u32>,
    /// Right child index per node (unused at leaves)
    pub right: Vec<u32>,
    /// Leaf contribution per node (unused at internal nodes)
    pub value: Vec<f64>,
}

impl Tree {
    fn validate(&self, index: usize, n_features: usize) -> std::result::Result<(), String> {
        let nodes = self.feature.len();
        if nodes == 0 {
            return Err(format!("tree {index} has no nodes"));
        }
        if self.threshold.len() != nodes
            || self.left.len() != nodes
            || self.right.len() != nodes
            || self.value.len() != nodes
        {
            return Err(format!(
                "tree {index} node arrays disagree on length: feature={}, threshold={}, left={}, right={}, value={}",
                nodes,
                self.threshold.len(),
                self.left.len(),
                self.right.len(),
                self.value.len()
            ));
        }
        for node in 0..nodes {
            let split = self.feature[node];
            if split < -1 {
                return Err(format!(
                    "tree {index} node {node} has invalid split feature {split}"
                ));
            }
            if split == -1 {
                continue;
            }
            if split as usize >= n_features {
                return Err(format!(
                    "tree {index} node {node} splits on feature {split}, model has {n_features}"
                ));
            }
            for child in [self.left[node], self.right[node]] {
                let child = child as usize;
                if child >= nodes || child <= node {
                    return Err(format!(
                        "tree {index} node {node} points at child {child} (nodes={nodes})"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Walk from the root to a leaf. Indexing is unchecked by construction:
    /// [`Tree::validate`] has already bounded every child and feature index,
    /// and forward-only children rule out cycles.
    fn score(&self, features: &[f32]) -> f64 {
        let mut node = 0usize;
        loop {
            let split = self.feature[node];
            if split == -1 {
                return self.value[node];
            }
            let x = f64::from(features[split as usize]);
            node = if x <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
    }
}

/// Capabilities advertised by [`TreeEnsemble`]
pub const TREE_ENSEMBLE_CAPABILITIES: &[Capability] =
    &[Capability::PointEstimate, Capability::Importances];

/// Capabilities advertised by [`LinearModel`]
pub const LINEAR_CAPABILITIES: &[Capability] = &[Capability::PointEstimate];

/// Gradient-boosted regression tree ensemble
///
/// The prediction is `base_score` plus the sum of every tree's leaf value.
/// The artifact carries the per-feature importance vector computed during
/// training; its length defines the feature width the ensemble accepts.
///
/// Both [`TreeEnsemble::new`] and deserialization run the structural checks,
/// so every ensemble in hand is walkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTreeEnsemble")]
pub struct TreeEnsemble {
    /// Additive offset applied before tree contributions
    base_score: f64,
    /// The boosted trees, applied in sequence
    trees: Vec<Tree>,
    /// Per-feature importance computed during training
    importances: Vec<f32>,
}

/// Wire form of [`TreeEnsemble`]; conversion goes through
/// [`TreeEnsemble::new`], so serde cannot hand out an unvalidated ensemble.
#[derive(Deserialize)]
struct RawTreeEnsemble {
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
    importances: Vec<f32>,
}

impl TryFrom<RawTreeEnsemble> for TreeEnsemble {
    type Error = TasarError;

    fn try_from(raw: RawTreeEnsemble) -> Result<Self> {
        Self::new(raw.base_score, raw.trees, raw.importances)
    }
}

impl TreeEnsemble {
    /// Artifact kind tag
    pub const KIND: &'static str = "tree_ensemble";

    /// Build an ensemble, rejecting structurally broken trees.
    pub fn new(base_score: f64, trees: Vec<Tree>, importances: Vec<f32>) -> Result<Self> {
        let ensemble = Self {
            base_score,
            trees,
            importances,
        };
        ensemble
            .validate()
            .map_err(TasarError::InvalidConfiguration)?;
        Ok(ensemble)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.importances.is_empty() {
            return Err("importance vector is empty".to_string());
        }
        if self.trees.is_empty() {
            return Err("ensemble has no trees".to_string());
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(index, self.importances.len())?;
        }
        Ok(())
    }

    /// Number of trees in the ensemble
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for TreeEnsemble {
    fn predict(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.importances.len() {
            return Err(TasarError::Inference(format!(
                "Invalid input dimension: got {}, expected {}",
                features.len(),
                self.importances.len()
            )));
        }
        let contributions: f64 = self.trees.iter().map(|tree| tree.score(features)).sum();
        Ok(self.base_score + contributions)
    }

    fn importances(&self) -> Option<&[f32]> {
        Some(&self.importances)
    }

    fn capabilities(&self) -> &'static [Capability] {
        TREE_ENSEMBLE_CAPABILITIES
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn n_features(&self) -> usize {
        self.importances.len()
    }
}

/// Linear model: weighted sum plus intercept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawLinearModel")]
pub struct LinearModel {
    /// Per-feature weights
    weights: Vec<f64>,
    /// Additive intercept
    intercept: f64,
}

/// Wire form of [`LinearModel`]; conversion goes through [`LinearModel::new`].
#[derive(Deserialize)]
struct RawLinearModel {
    weights: Vec<f64>,
    #[serde(default)]
    intercept: f64,
}

impl TryFrom<RawLinearModel> for LinearModel {
    type Error = TasarError;

    fn try_from(raw: RawLinearModel) -> Result<Self> {
        Self::new(raw.weights, raw.intercept)
    }
}

impl LinearModel {
    /// Artifact kind tag
    pub const KIND: &'static str = "linear";

    /// Build a linear model from fitted weights.
    pub fn new(weights: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self { weights, intercept };
        model.validate().map_err(TasarError::InvalidConfiguration)?;
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.weights.is_empty() {
            return Err("weight vector is empty".to_string());
        }
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(TasarError::Inference(format!(
                "Invalid input dimension: got {}, expected {}",
                features.len(),
                self.weights.len()
            )));
        }
        let dot: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * f64::from(*x))
            .sum();
        Ok(dot + self.intercept)
    }

    fn capabilities(&self) -> &'static [Capability] {
        LINEAR_CAPABILITIES
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }
}

fn malformed(path: &Path, detail: String) -> TasarError {
    TasarError::ArtifactFormat {
        path: path.to_path_buf(),
        detail,
    }
}

/// Load a predictor artifact, dispatching on its `"kind"` tag.
///
/// # Errors
///
/// Fails when the file is unreadable, is not a JSON object, omits the
/// `"kind"` tag, names a kind this binary does not implement, or fails the
/// kind's structural validation. All of these are startup-fatal.
pub fn load_predictor(path: &Path) -> Result<Box<dyn Predictor>> {
    let data = fs::read_to_string(path).map_err(|source| TasarError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| malformed(path, e.to_string()))?;
    let kind = value
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| malformed(path, "missing \"kind\" tag".to_string()))?
        .to_string();

    match kind.as_str() {
        TreeEnsemble::KIND => {
            let ensemble: TreeEnsemble =
                serde_json::from_value(value).map_err(|e| malformed(path, e.to_string()))?;
            Ok(Box::new(ensemble))
        },
        LinearModel::KIND => {
            let model: LinearModel =
                serde_json::from_value(value).map_err(|e| malformed(path, e.to_string()))?;
            Ok(Box::new(model))
        },
        other => Err(malformed(
            path,
            format!("unknown predictor kind '{other}' (supported: tree_ensemble, linear)"),
        )),
    }
}
