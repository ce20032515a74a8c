//! Decision thresholds for the majority-vote rule
//!
//! A `ThresholdSet` holds the five cutoffs the scoring rule compares
//! features against. It is serialized to JSON for display and stored
//! column-wise in the threshold log. Exactly one set is "current" at a
//! time; the live copy sits in a `ThresholdCell` shared by the scoring
//! path (readers) and the calibrator (sole writer).

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// The five cutoffs of the scoring rule
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    /// Full if the original file is larger than this (kilobytes)
    pub size_kb: f64,

    /// Full if more of the ground slice than this is waste-like
    pub ground_ratio: f64,

    /// Full if the luma histogram variance is above this
    pub entropy: f64,

    /// Full if contrast is BELOW this. Cluttered containers read flatter.
    pub contrast: f64,

    /// Full if more pixels than this are dark
    pub dark_ratio: f64,
}

impl Default for ThresholdSet {
    /// Hardcoded fallback floor, used when the log is empty and on reset
    fn default() -> Self {
        Self {
            size_kb: 319.0,
            ground_ratio: 0.23,
            entropy: 5048.0,
            contrast: 75.0,
            dark_ratio: 0.31,
        }
    }
}

impl ThresholdSet {
    /// Create the default threshold set
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to JSON string for display and export
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this is exactly the hardcoded default
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Process-wide holder of the current threshold set.
///
/// Reads copy the whole set out under the lock, so a scorer never sees a
/// mix of old and new cutoffs. Writers replace the whole value.
#[derive(Debug, Default)]
pub struct ThresholdCell {
    current: RwLock<ThresholdSet>,
}

impl ThresholdCell {
    pub fn new(initial: ThresholdSet) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Consistent copy of the current set
    pub fn snapshot(&self) -> ThresholdSet {
        // A poisoned lock still holds a fully written value
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the current set, returning the previous one
    pub fn publish(&self, next: ThresholdSet) -> ThresholdSet {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
