//! Shared data structures for the classifier state
//!
//! These structs represent the data model that flows between
//! the extraction pipeline, the scoring rule and the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::thresholds::ThresholdSet;

/// Photometric measurements for one processed image
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Width after downscale
    pub width: u32,
    /// Height after downscale
    pub height: u32,
    /// Size of the original encoded bytes in kilobytes
    pub size_kb: f64,

    // ========== Color ==========

    pub mean_r: f64,
    pub mean_g: f64,
    pub mean_b: f64,

    // ========== Texture ==========

    /// Variance of the 256-bin luma histogram counts
    pub entropy: f64,
    /// Mean of the per-channel standard deviations
    pub contrast: f64,
    /// Fraction of pixels with luma below the dark cutoff
    pub dark_ratio: f64,
    /// Fraction of waste-like pixels in the ground slice, in [0, 1]
    pub ground_ratio: f64,
}

impl FeatureVector {
    /// True when every floating point feature is a real number
    pub fn is_finite(&self) -> bool {
        [
            self.size_kb,
            self.mean_r,
            self.mean_g,
            self.mean_b,
            self.entropy,
            self.contrast,
            self.dark_ratio,
            self.ground_ratio,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Container fill state assigned by the scoring rule
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Full,
    Empty,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Full => "full",
            Label::Empty => "empty",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "pleine"/"vide" are the labels written by the first backend
        match s.trim().to_lowercase().as_str() {
            "full" | "pleine" => Ok(Label::Full),
            "empty" | "vide" => Ok(Label::Empty),
            other => Err(format!("Unknown label: {other}")),
        }
    }
}

/// One processed image: its features, its label and optional metadata.
/// Records are append-only and never mutated after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Filename or caller-supplied identifier
    pub filename: String,
    #[serde(flatten)]
    pub features: FeatureVector,
    pub label: Label,
    /// Free-form note attached by the uploader
    pub annotation: Option<String>,
    /// Where the container was photographed
    pub location: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A record as read back from the history store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Insertion id (monotonic)
    pub id: i64,
    #[serde(flatten)]
    pub record: FeatureRecord,
}

/// Why a threshold set was written to the log
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOrigin {
    Calibration,
    Reset,
}

impl ThresholdOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdOrigin::Calibration => "calibration",
            ThresholdOrigin::Reset => "reset",
        }
    }
}

impl FromStr for ThresholdOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calibration" => Ok(ThresholdOrigin::Calibration),
            "reset" => Ok(ThresholdOrigin::Reset),
            other => Err(format!("Unknown threshold origin: {other}")),
        }
    }
}

/// One row of the threshold log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThresholdEntry {
    pub id: i64,
    pub thresholds: ThresholdSet,
    pub origin: ThresholdOrigin,
    /// Agreement with history reached by the calibration run, if any
    pub accuracy: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_accepts_legacy_names() {
        assert_eq!("full".parse::<Label>().unwrap(), Label::Full);
        assert_eq!("Pleine".parse::<Label>().unwrap(), Label::Full);
        assert_eq!("vide".parse::<Label>().unwrap(), Label::Empty);
        assert!("half".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_serializes_lowercase() {
        let json = serde_json::to_string(&Label::Full).unwrap();
        assert_eq!(json, "\"full\"");
    }

    #[test]
    fn test_non_finite_features_detected() {
        let mut features = FeatureVector {
            width: 10,
            height: 10,
            size_kb: 12.0,
            mean_r: 1.0,
            mean_g: 1.0,
            mean_b: 1.0,
            entropy: 100.0,
            contrast: 20.0,
            dark_ratio: 0.1,
            ground_ratio: 0.2,
        };
        assert!(features.is_finite());

        features.entropy = f64::NAN;
        assert!(!features.is_finite());
    }
}
