//! Feature-encoding pipeline
//!
//! Turns a raw prediction request into the fixed-order numeric vector the
//! trained predictor was fit on. The column order is a contract shared with
//! offline training: it lives in [`FEATURE_ORDER`], is validated against the
//! artifact manifest at load time, and must never be reordered here without
//! retraining the model.
//!
//! The sequence is: target-encode brand/model/origin, label-encode
//! fuel_type/region, assemble the nine-feature block, standardize it, then
//! append the gearbox code **unscaled** as the tenth element. Gearbox is a
//! two-valued code; standardizing it would distort its contribution, so the
//! append-after-scaling order is intentional and load-bearing.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::encoder::{LabelEncoder, StandardScaler, TargetEncoder};
use crate::error::{Result, TasarError};

/// Column order the predictor was trained on.
///
/// Element 10 (`gearbox`) is appended after scaling and is never
/// standardized.
pub const FEATURE_ORDER: [&str; 10] = [
    "mileage",
    "brand",
    "model",
    "origin",
    "fiscal_power",
    "condition",
    "year",
    "fuel_type",
    "region",
    "gearbox",
];

/// Number of features that pass through the scaler (all but gearbox).
pub const SCALED_FEATURES: usize = FEATURE_ORDER.len() - 1;

/// One prediction request as received on the wire.
///
/// Numeric fields accept JSON numbers or numeric strings; categorical fields
/// are matched verbatim against the fitted vocabularies. `condition` arrives
/// pre-mapped to its ordinal code by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Odometer reading in kilometers
    #[serde(deserialize_with = "lenient_f64")]
    pub mileage: f64,
    /// Vehicle brand (target-encoded, unseen values degrade to global mean)
    pub brand: String,
    /// Vehicle model (target-encoded)
    pub model: String,
    /// Import/registration origin (target-encoded)
    pub origin: String,
    /// Fiscal horsepower
    #[serde(deserialize_with = "lenient_f64")]
    pub fiscal_power: f64,
    /// Ordinal condition code, already mapped from its display label
    #[serde(deserialize_with = "lenient_i64")]
    pub condition: i64,
    /// Model year
    #[serde(deserialize_with = "lenient_f64")]
    pub year: f64,
    /// Gearbox type (label-encoded, unseen values fail)
    pub gearbox: String,
    /// Fuel type (label-encoded)
    pub fuel_type: String,
    /// Administrative region (label-encoded)
    pub region: String,
}

struct LenientF64;

impl Visitor<'_> for LenientF64 {
    type Value = f64;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a number or numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<f64, E> {
        v.trim()
            .parse::<f64>()
            .map_err(|_| E::custom(format!("invalid numeric value: '{v}'")))
    }
}

struct LenientI64;

impl Visitor<'_> for LenientI64 {
    type Value = i64;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an integer or integer string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(format!("integer out of range: {v}")))
    }

    // Fractional codes truncate toward zero, matching the runtime the
    // artifacts were fitted under.
    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<i64, E> {
        if v.is_finite() {
            Ok(v as i64)
        } else {
            Err(E::custom(format!("invalid condition code: {v}")))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<i64, E> {
        v.trim()
            .parse::<i64>()
            .map_err(|_| E::custom(format!("invalid integer value: '{v}'")))
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    de.deserialize_any(LenientF64)
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<i64, D::Error> {
    de.deserialize_any(LenientI64)
}

/// The fitted encode/scale/concat pipeline.
///
/// Owns the three label encoders, the target-encoding table, and the scaler,
/// all loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    gearbox: LabelEncoder,
    fuel_type: LabelEncoder,
    region: LabelEncoder,
    target: TargetEncoder,
    scaler: StandardScaler,
}

impl FeaturePipeline {
    /// Assemble a pipeline from fitted transformers.
    ///
    /// The scaler must cover exactly the nine pre-gearbox features; any other
    /// width means the artifacts were fit against a different column layout.
    pub fn new(
        gearbox: LabelEncoder,
        fuel_type: LabelEncoder,
        region: LabelEncoder,
        target: TargetEncoder,
        scaler: StandardScaler,
    ) -> Result<Self> {
        if scaler.len() != SCALED_FEATURES {
            return Err(TasarError::InvalidConfiguration(format!(
                "scaler covers {} features, expected {} (all but gearbox)",
                scaler.len(),
                SCALED_FEATURES
            )));
        }
        Ok(Self {
            gearbox,
            fuel_type,
            region,
            target,
            scaler,
        })
    }

    /// Encode one request into the 10-element vector the predictor consumes.
    ///
    /// Brand, model, and origin are total lookups (unseen values use the
    /// stored global mean); gearbox, fuel type, and region are partial and
    /// fail with [`TasarError::UnknownCategory`] on values outside the
    /// fitted vocabularies.
    pub fn encode(&self, request: &PredictionRequest) -> Result<Vec<f32>> {
        let brand = self.target.encode("brand", &request.brand);
        let model = self.target.encode("model", &request.model);
        let origin = self.target.encode("origin", &request.origin);

        let gearbox = self.gearbox.transform("gearbox", &request.gearbox)?;
        let fuel_type = self.fuel_type.transform("fuel_type", &request.fuel_type)?;
        let region = self.region.transform("region", &request.region)?;

        // FEATURE_ORDER[..9], scaled as one block.
        let raw = [
            request.mileage,
            brand,
            model,
            origin,
            request.fiscal_power,
            request.condition as f64,
            request.year,
            f64::from(fuel_type),
            f64::from(region),
        ];
        let scaled = self.scaler.transform(&raw)?;

        let mut features: Vec<f32> = scaled.iter().map(|v| *v as f32).collect();
        // Gearbox joins after scaling, untouched.
        features.push(gearbox as f32);
        Ok(features)
    }

    /// Gearbox vocabulary, in code order
    #[must_use]
    pub fn gearbox_classes(&self) -> &[String] {
        self.gearbox.classes()
    }

    /// Fuel-type vocabulary, in code order
    #[must_use]
    pub fn fuel_type_classes(&self) -> &[String] {
        self.fuel_type.classes()
    }

    /// Region vocabulary, in code order
    #[must_use]
    pub fn region_classes(&self) -> &[String] {
        self.region.classes()
    }

    /// The target-encoding table (brands, models, origins)
    #[must_use]
    pub fn target_encoder(&self) -> &TargetEncoder {
        &self.target
    }
}
