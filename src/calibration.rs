//! Threshold calibration by exhaustive grid search.
//!
//! Every candidate threshold set in the grid is scored against the whole
//! feature history: each record's label is recomputed with the candidate
//! and compared with the label stored for it. The candidate with the most
//! matches wins.
//!
//! Enumeration order is lexicographic over the five candidate sequences
//! with `size_kb` outermost, then `ground_ratio`, `entropy`, `contrast`,
//! and `dark_ratio` innermost; each sequence runs from its `start`
//! upwards. A candidate only replaces the current best on a strictly
//! higher match count, so among equally good candidates the first one in
//! that order is kept. Nothing else depends on the order.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::scoring;
use crate::state::{FeatureRecord, ThresholdSet};

/// Arithmetic sequence `start, start + step, ...` with `count` values
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CandidateRange {
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl CandidateRange {
    pub const fn new(start: f64, step: f64, count: usize) -> Self {
        Self { start, step, count }
    }

    /// Candidate values in ascending enumeration order.
    /// Computed from the index to avoid accumulating float error.
    pub fn values(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| self.start + self.step * i as f64)
            .collect()
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if self.count == 0 {
            return Err(format!("candidate range '{name}' is empty"));
        }
        if !self.start.is_finite() || !self.step.is_finite() {
            return Err(format!("candidate range '{name}' is not finite"));
        }
        if self.count > 1 && self.step <= 0.0 {
            return Err(format!("candidate range '{name}' needs a positive step"));
        }
        Ok(())
    }
}

/// One candidate sequence per threshold dimension
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CandidateGrid {
    pub size_kb: CandidateRange,
    pub ground_ratio: CandidateRange,
    pub entropy: CandidateRange,
    pub contrast: CandidateRange,
    pub dark_ratio: CandidateRange,
}

impl Default for CandidateGrid {
    /// Eleven values per dimension bracketing the default thresholds
    fn default() -> Self {
        Self {
            size_kb: CandidateRange::new(100.0, 50.0, 11),
            ground_ratio: CandidateRange::new(0.05, 0.05, 11),
            entropy: CandidateRange::new(2000.0, 600.0, 11),
            contrast: CandidateRange::new(40.0, 5.0, 11),
            dark_ratio: CandidateRange::new(0.05, 0.05, 11),
        }
    }
}

impl CandidateGrid {
    pub fn validate(&self) -> Result<(), String> {
        self.size_kb.validate("size_kb")?;
        self.ground_ratio.validate("ground_ratio")?;
        self.entropy.validate("entropy")?;
        self.contrast.validate("contrast")?;
        self.dark_ratio.validate("dark_ratio")?;
        Ok(())
    }

    /// Number of candidate threshold sets
    pub fn len(&self) -> usize {
        self.size_kb.count
            * self.ground_ratio.count
            * self.entropy.count
            * self.contrast.count
            * self.dark_ratio.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy Cartesian product of the five sequences, in enumeration order
    pub fn candidates(&self) -> impl Iterator<Item = ThresholdSet> {
        let sizes = self.size_kb.values();
        let grounds = self.ground_ratio.values();
        let entropies = self.entropy.values();
        let contrasts = self.contrast.values();
        let darks = self.dark_ratio.values();

        sizes.into_iter().flat_map(move |size_kb| {
            let entropies = entropies.clone();
            let contrasts = contrasts.clone();
            let darks = darks.clone();
            grounds.clone().into_iter().flat_map(move |ground_ratio| {
                let contrasts = contrasts.clone();
                let darks = darks.clone();
                entropies.clone().into_iter().flat_map(move |entropy| {
                    let darks = darks.clone();
                    contrasts.clone().into_iter().flat_map(move |contrast| {
                        darks.clone().into_iter().map(move |dark_ratio| ThresholdSet {
                            size_kb,
                            ground_ratio,
                            entropy,
                            contrast,
                            dark_ratio,
                        })
                    })
                })
            })
        })
    }
}

/// Result of one calibration run
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    pub thresholds: ThresholdSet,
    /// Fraction of records whose stored label the thresholds reproduce
    pub accuracy: f64,
    /// Candidates scored
    pub evaluated: usize,
    /// Records scored per candidate
    pub history_size: usize,
}

/// Records whose stored label `thresholds` reproduces
pub fn agreement(records: &[FeatureRecord], thresholds: &ThresholdSet) -> usize {
    records
        .iter()
        .filter(|r| scoring::classify(&r.features, thresholds) == r.label)
        .count()
}

/// Search the grid for the best-agreeing threshold set
pub fn calibrate(records: &[FeatureRecord], grid: &CandidateGrid) -> Result<CalibrationOutcome, CalibrationError> {
    calibrate_with(records, grid, |_, _| {})
}

/// Like [`calibrate`], calling `on_improvement` each time a new best is found
pub fn calibrate_with<F>(
    records: &[FeatureRecord],
    grid: &CandidateGrid,
    mut on_improvement: F,
) -> Result<CalibrationOutcome, CalibrationError>
where
    F: FnMut(&ThresholdSet, f64),
{
    if records.is_empty() {
        return Err(CalibrationError::EmptyHistory);
    }
    if let Some(index) = records.iter().position(|r| !r.features.is_finite()) {
        return Err(CalibrationError::MalformedRecord { index });
    }

    let total = records.len();
    let mut best: Option<(ThresholdSet, usize)> = None;
    let mut evaluated = 0usize;

    for candidate in grid.candidates() {
        evaluated += 1;
        let matches = agreement(records, &candidate);

        // Strictly better only: ties keep the earlier candidate
        if best.map_or(true, |(_, best_matches)| matches > best_matches) {
            best = Some((candidate, matches));
            on_improvement(&candidate, matches as f64 / total as f64);

            if matches == total {
                // Cannot be beaten, and later candidates would only tie
                break;
            }
        }
    }

    let (thresholds, matches) = best.ok_or(CalibrationError::EmptyGrid)?;

    Ok(CalibrationOutcome {
        thresholds,
        accuracy: matches as f64 / total as f64,
        evaluated,
        history_size: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FeatureVector, Label};
    use chrono::Utc;

    fn record(size_kb: f64, ground_ratio: f64, entropy: f64, contrast: f64, dark_ratio: f64, label: Label) -> FeatureRecord {
        FeatureRecord {
            filename: "bin.jpg".to_string(),
            features: FeatureVector {
                width: 800,
                height: 600,
                size_kb,
                mean_r: 100.0,
                mean_g: 100.0,
                mean_b: 100.0,
                entropy,
                contrast,
                dark_ratio,
                ground_ratio,
            },
            label,
            annotation: None,
            location: None,
            recorded_at: Utc::now(),
        }
    }

    fn small_grid() -> CandidateGrid {
        CandidateGrid {
            size_kb: CandidateRange::new(100.0, 100.0, 4),
            ground_ratio: CandidateRange::new(0.1, 0.1, 3),
            entropy: CandidateRange::new(2000.0, 2000.0, 3),
            contrast: CandidateRange::new(50.0, 20.0, 3),
            dark_ratio: CandidateRange::new(0.1, 0.1, 3),
        }
    }

    #[test]
    fn test_default_grid_size() {
        let grid = CandidateGrid::default();
        assert_eq!(grid.len(), 11usize.pow(5));
        assert!(grid.validate().is_ok());
        assert_eq!(grid.size_kb.values().last().copied(), Some(600.0));
    }

    #[test]
    fn test_enumeration_order() {
        let grid = small_grid();
        let all: Vec<ThresholdSet> = grid.candidates().collect();
        assert_eq!(all.len(), grid.len());

        // Innermost dimension changes first
        assert_eq!(all[0].dark_ratio, 0.1);
        assert_eq!(all[1].dark_ratio, 0.2);
        assert_eq!(all[0].size_kb, all[1].size_kb);
        assert_eq!(all[0].contrast, all[1].contrast);

        // Outermost dimension changes last
        let per_size = grid.len() / grid.size_kb.count;
        assert_eq!(all[per_size - 1].size_kb, 100.0);
        assert_eq!(all[per_size].size_kb, 200.0);
    }

    #[test]
    fn test_empty_history_is_an_error() {
        let result = calibrate(&[], &small_grid());
        assert!(matches!(result, Err(CalibrationError::EmptyHistory)));
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let records = vec![
            record(300.0, 0.2, 4000.0, 60.0, 0.2, Label::Full),
            record(f64::NAN, 0.2, 4000.0, 60.0, 0.2, Label::Full),
        ];
        let result = calibrate(&records, &small_grid());
        assert!(matches!(result, Err(CalibrationError::MalformedRecord { index: 1 })));
    }

    #[test]
    fn test_finds_separating_thresholds() {
        // Full bins are big, cluttered and dark; empty ones the opposite
        let records = vec![
            record(450.0, 0.35, 5500.0, 45.0, 0.35, Label::Full),
            record(420.0, 0.28, 6100.0, 48.0, 0.32, Label::Full),
            record(380.0, 0.31, 4900.0, 52.0, 0.27, Label::Full),
            record(120.0, 0.04, 1500.0, 95.0, 0.05, Label::Empty),
            record(150.0, 0.06, 1800.0, 88.0, 0.08, Label::Empty),
            record(180.0, 0.08, 1200.0, 91.0, 0.06, Label::Empty),
        ];

        let outcome = calibrate(&records, &small_grid()).unwrap();

        assert_eq!(outcome.accuracy, 1.0);
        assert_eq!(outcome.history_size, 6);
        assert_eq!(agreement(&records, &outcome.thresholds), 6);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        // Every candidate labels both records empty, so every candidate ties
        let records = vec![
            record(0.0, 0.0, 0.0, 1000.0, 0.0, Label::Empty),
            record(0.0, 0.0, 0.0, 1000.0, 0.0, Label::Full),
        ];
        let grid = small_grid();

        let outcome = calibrate(&records, &grid).unwrap();

        assert_eq!(outcome.accuracy, 0.5);
        assert_eq!(Some(outcome.thresholds), grid.candidates().next());
        assert_eq!(outcome.evaluated, grid.len());
    }

    #[test]
    fn test_best_accuracy_never_decreases() {
        let records = vec![
            record(450.0, 0.35, 5500.0, 45.0, 0.35, Label::Full),
            record(150.0, 0.30, 1800.0, 88.0, 0.08, Label::Full),
            record(380.0, 0.05, 4900.0, 52.0, 0.27, Label::Empty),
            record(120.0, 0.04, 6500.0, 95.0, 0.45, Label::Empty),
            record(300.0, 0.20, 3000.0, 70.0, 0.20, Label::Full),
        ];

        let mut trace = Vec::new();
        let outcome = calibrate_with(&records, &small_grid(), |_, accuracy| trace.push(accuracy)).unwrap();

        assert!(!trace.is_empty());
        assert!(trace.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(trace.last().copied(), Some(outcome.accuracy));
    }

    #[test]
    fn test_order_of_history_does_not_matter() {
        let mut records = vec![
            record(450.0, 0.35, 5500.0, 45.0, 0.35, Label::Full),
            record(150.0, 0.30, 1800.0, 88.0, 0.08, Label::Full),
            record(380.0, 0.05, 4900.0, 52.0, 0.27, Label::Empty),
            record(120.0, 0.04, 6500.0, 95.0, 0.45, Label::Empty),
        ];
        let forward = calibrate(&records, &small_grid()).unwrap();
        records.reverse();
        let backward = calibrate(&records, &small_grid()).unwrap();

        assert_eq!(forward.thresholds, backward.thresholds);
        assert_eq!(forward.accuracy, backward.accuracy);
    }
}
