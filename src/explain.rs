//! Coarse feature-impact summary derived from predictor importances
//!
//! Ranks features by importance, keeps the top three, and reports a label
//! for year, mileage, and condition when they make the cut. The labels and
//! thresholds are part of the served wire format; deployed form clients
//! pattern-match on these exact strings.

use serde::{Deserialize, Serialize};

use crate::pipeline::FEATURE_ORDER;

/// How many top-ranked features are considered for impact labels
const TOP_FEATURES: usize = 3;

/// Impact labels for the three features clients surface
///
/// Fields absent from the top three (or when the predictor exposes no
/// importances at all) stay `None` and are omitted from the response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureImpact {
    /// "élevé" above 0.2 importance, "modéré" at or below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_impact: Option<String>,
    /// "élevé" above 0.15 importance, "modéré" at or below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage_impact: Option<String>,
    /// "important" above 0.1 importance, "secondaire" at or below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_impact: Option<String>,
}

impl FeatureImpact {
    /// True when no label was produced
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.year_impact.is_none()
            && self.mileage_impact.is_none()
            && self.condition_impact.is_none()
    }
}

/// Rank `importances` (aligned with [`FEATURE_ORDER`]) and label the top
/// three. Extra importance entries beyond the known columns are ignored;
/// a short vector labels only the columns it covers.
#[must_use]
pub fn assess(importances: &[f32]) -> FeatureImpact {
    let mut ranked: Vec<(usize, f32)> = importances
        .iter()
        .copied()
        .enumerate()
        .filter(|(index, _)| *index < FEATURE_ORDER.len())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut impact = FeatureImpact::default();
    for (index, importance) in ranked.into_iter().take(TOP_FEATURES) {
        match FEATURE_ORDER[index] {
            "year" => {
                impact.year_impact =
                    Some(if importance > 0.2 { "élevé" } else { "modéré" }.to_string());
            },
            "mileage" => {
                impact.mileage_impact =
                    Some(if importance > 0.15 { "élevé" } else { "modéré" }.to_string());
            },
            "condition" => {
                impact.condition_impact = Some(
                    if importance > 0.1 {
                        "important"
                    } else {
                        "secondaire"
                    }
                    .to_string(),
                );
            },
            _ => {},
        }
    }
    impact
}
