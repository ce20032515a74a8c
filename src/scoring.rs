//! Majority-vote scoring rule.
//!
//! Five independent predicates, one per threshold, each worth one vote.
//! Three or more votes make the container full. The rule is pure: it
//! reads a feature vector and a threshold set and touches nothing else.

use serde::Serialize;

use crate::state::{FeatureVector, Label, ThresholdSet};

/// Votes needed for a "full" label (majority of five)
pub const FULL_SCORE: u8 = 3;

/// Outcome of each predicate, kept so a label can be explained
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicates {
    /// size_kb > cutoff
    pub size_kb: bool,
    /// ground_ratio > cutoff
    pub ground_ratio: bool,
    /// entropy > cutoff
    pub entropy: bool,
    /// contrast < cutoff (inverted: flat images read as cluttered)
    pub contrast: bool,
    /// dark_ratio > cutoff
    pub dark_ratio: bool,
}

impl Predicates {
    pub fn evaluate(features: &FeatureVector, thresholds: &ThresholdSet) -> Self {
        Self {
            size_kb: features.size_kb > thresholds.size_kb,
            ground_ratio: features.ground_ratio > thresholds.ground_ratio,
            entropy: features.entropy > thresholds.entropy,
            contrast: features.contrast < thresholds.contrast,
            dark_ratio: features.dark_ratio > thresholds.dark_ratio,
        }
    }

    /// Number of satisfied predicates, 0..=5
    pub fn count(&self) -> u8 {
        [
            self.size_kb,
            self.ground_ratio,
            self.entropy,
            self.contrast,
            self.dark_ratio,
        ]
        .iter()
        .filter(|&&hit| hit)
        .count() as u8
    }
}

/// Score, label and the votes behind them
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub predicates: Predicates,
    pub score: u8,
    pub label: Label,
}

/// Label for a given vote count
pub fn label_for_score(score: u8) -> Label {
    if score >= FULL_SCORE {
        Label::Full
    } else {
        Label::Empty
    }
}

/// Run the rule and keep the individual votes
pub fn evaluate(features: &FeatureVector, thresholds: &ThresholdSet) -> Verdict {
    let predicates = Predicates::evaluate(features, thresholds);
    let score = predicates.count();
    Verdict {
        predicates,
        score,
        label: label_for_score(score),
    }
}

/// Vote count only
pub fn score(features: &FeatureVector, thresholds: &ThresholdSet) -> u8 {
    Predicates::evaluate(features, thresholds).count()
}

/// Label only
pub fn classify(features: &FeatureVector, thresholds: &ThresholdSet) -> Label {
    label_for_score(score(features, thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(size_kb: f64, ground_ratio: f64, entropy: f64, contrast: f64, dark_ratio: f64) -> FeatureVector {
        FeatureVector {
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
        }
    }

    #[test]
    fn test_all_predicates_true_is_full() {
        let verdict = evaluate(&features(400.0, 0.30, 6000.0, 50.0, 0.40), &ThresholdSet::default());
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.label, Label::Full);
        assert!(verdict.predicates.contrast);
    }

    #[test]
    fn test_all_predicates_false_is_empty() {
        let verdict = evaluate(&features(100.0, 0.05, 1000.0, 90.0, 0.10), &ThresholdSet::default());
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.label, Label::Empty);
    }

    #[test]
    fn test_three_votes_is_full() {
        // size, ground and entropy above cutoffs; contrast high, dark low
        let f = features(400.0, 0.30, 6000.0, 90.0, 0.10);
        assert_eq!(score(&f, &ThresholdSet::default()), 3);
        assert_eq!(classify(&f, &ThresholdSet::default()), Label::Full);
    }

    #[test]
    fn test_two_votes_is_empty() {
        let f = features(400.0, 0.30, 1000.0, 90.0, 0.10);
        assert_eq!(score(&f, &ThresholdSet::default()), 2);
        assert_eq!(classify(&f, &ThresholdSet::default()), Label::Empty);
    }

    #[test]
    fn test_cutoffs_are_strict() {
        let t = ThresholdSet::default();
        // Exactly on every cutoff: no predicate fires
        let f = features(t.size_kb, t.ground_ratio, t.entropy, t.contrast, t.dark_ratio);
        assert_eq!(score(&f, &t), 0);
    }

    #[test]
    fn test_contrast_is_inverted() {
        let t = ThresholdSet::default();
        let low = features(0.0, 0.0, 0.0, 10.0, 0.0);
        let high = features(0.0, 0.0, 0.0, 200.0, 0.0);
        assert!(Predicates::evaluate(&low, &t).contrast);
        assert!(!Predicates::evaluate(&high, &t).contrast);
    }

    #[test]
    fn test_label_iff_score_at_least_three() {
        for s in 0..=5u8 {
            let expected = if s >= 3 { Label::Full } else { Label::Empty };
            assert_eq!(label_for_score(s), expected);
        }
    }

    #[test]
    fn test_pure_and_deterministic() {
        let t = ThresholdSet::default();
        let f = features(320.0, 0.2, 5100.0, 74.0, 0.3);
        let before = (f, t);
        let a = evaluate(&f, &t);
        let b = evaluate(&f, &t);
        assert_eq!(a, b);
        assert_eq!((f, t), before);
    }
}
