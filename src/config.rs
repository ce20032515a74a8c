//! Classifier configuration.
//!
//! Everything tunable about extraction and calibration lives in
//! `ClassifierConfig`. It is read from a JSON file (missing fields take
//! their defaults) and validated before the classifier starts.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calibration::CandidateGrid;
use crate::error::ConfigError;
use crate::features::extract::{DEFAULT_DARK_LUMA, DEFAULT_MAX_SIDE};
use crate::features::ground::DEFAULT_GROUND_SLICE;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Longest side after downscale, in pixels
    pub max_side: u32,

    /// Share of the frame height, from the bottom, searched for waste
    pub ground_slice: f64,

    /// Luma below which a pixel counts as dark
    pub dark_luma_cutoff: u8,

    /// Recalibrate in the background after every stored record
    pub auto_calibrate: bool,

    /// Candidate cutoffs tried by calibration
    pub grid: CandidateGrid,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            ground_slice: DEFAULT_GROUND_SLICE,
            dark_luma_cutoff: DEFAULT_DARK_LUMA,
            auto_calibrate: true,
            grid: CandidateGrid::default(),
        }
    }
}

impl ClassifierConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to pretty JSON, e.g. to write a starter config
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_side == 0 {
            return Err(ConfigError::Invalid("max_side must be positive".to_string()));
        }
        if !(self.ground_slice > 0.0 && self.ground_slice <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "ground_slice must be in (0, 1], got {}",
                self.ground_slice
            )));
        }
        self.grid.validate().map_err(ConfigError::Invalid)
    }
}
