//! Derived score formulas for gap intervals.
//!
//! # Responsibility
//! - Turn interval statistics into neutral numeric scores.
//! - Map severity onto the coarse level scale.
//!
//! # Invariants
//! - Severity and confidence always land in [0, 1].
//! - Severity is monotonically non-decreasing in persistence and observations.
//! - No intent or legal judgment is attached to any score.

use crate::model::interval::GapLevel;

/// Numerically stable logistic function.
///
/// Split on the sign of `x` so the exponential argument is never positive,
/// avoiding overflow for large magnitudes.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Severity from persistence, observation volume, and the signal weight.
///
/// `sigmoid(0.4 * ln(1 + persistence_days) + 0.4 * ln(1 + observations)
/// + 0.2 * signal_weight)`: numeric escalation only, bounded by the sigmoid.
pub fn compute_severity(persistence_days: u32, observations: u32, signal_weight: f64) -> f64 {
    let persistence_term = (1.0 + f64::from(persistence_days)).ln();
    let volume_term = (1.0 + f64::from(observations)).ln();
    let raw = 0.4 * persistence_term + 0.4 * volume_term + 0.2 * signal_weight;
    sigmoid(raw)
}

/// Credibility of the negative observation stream.
///
/// Rewards strong individual observations (`obs_strength_avg`) and
/// repetition, with diminishing returns on repetition; clamped to [0, 1].
pub fn compute_confidence(obs_strength_avg: f64, observations: u32) -> f64 {
    let repetition = 1.0 - (-0.35 * f64::from(observations)).exp();
    let base = obs_strength_avg.clamp(0.0, 1.0);
    (0.6 * base + 0.4 * repetition).clamp(0.0, 1.0)
}

/// Threshold mapping from severity to the coarse level scale.
pub fn promote_level(severity: f64) -> GapLevel {
    if severity > 0.85 {
        GapLevel::Systemic
    } else if severity > 0.65 {
        GapLevel::Structural
    } else if severity > 0.40 {
        GapLevel::Persistent
    } else {
        GapLevel::Observed
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_confidence, compute_severity, promote_level, sigmoid};
    use crate::model::interval::GapLevel;

    #[test]
    fn sigmoid_is_stable_and_bounded() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        let symmetric = sigmoid(2.0) + sigmoid(-2.0);
        assert!((symmetric - 1.0).abs() < 1e-12);
    }

    #[test]
    fn severity_stays_in_unit_range() {
        for persistence in [1, 7, 365, 10_000] {
            for observations in [1, 5, 1_000] {
                let severity = compute_severity(persistence, observations, 3.0);
                assert!((0.0..=1.0).contains(&severity), "severity {severity}");
            }
        }
    }

    #[test]
    fn severity_grows_with_persistence_and_observations() {
        let base = compute_severity(1, 1, 1.0);
        assert!(compute_severity(7, 1, 1.0) > base);
        assert!(compute_severity(1, 5, 1.0) > base);
        assert!(compute_severity(7, 5, 1.0) > compute_severity(7, 1, 1.0));
    }

    #[test]
    fn confidence_rewards_strength_and_repetition() {
        let single_weak = compute_confidence(0.2, 1);
        let single_strong = compute_confidence(0.9, 1);
        let repeated_strong = compute_confidence(0.9, 6);
        assert!(single_strong > single_weak);
        assert!(repeated_strong > single_strong);
        assert!((0.0..=1.0).contains(&repeated_strong));
    }

    #[test]
    fn confidence_clamps_out_of_range_average() {
        let inflated = compute_confidence(4.2, 3);
        let capped = compute_confidence(1.0, 3);
        assert_eq!(inflated, capped);
        assert!(compute_confidence(-0.5, 1) <= compute_confidence(0.0, 1));
    }

    #[test]
    fn level_thresholds_are_strict_upper_bounds() {
        assert_eq!(promote_level(0.0), GapLevel::Observed);
        assert_eq!(promote_level(0.40), GapLevel::Observed);
        assert_eq!(promote_level(0.41), GapLevel::Persistent);
        assert_eq!(promote_level(0.65), GapLevel::Persistent);
        assert_eq!(promote_level(0.66), GapLevel::Structural);
        assert_eq!(promote_level(0.85), GapLevel::Structural);
        assert_eq!(promote_level(0.86), GapLevel::Systemic);
        assert_eq!(promote_level(1.0), GapLevel::Systemic);
    }
}
