//! Engine configuration value objects.
//!
//! # Responsibility
//! - Carry decision thresholds, fingerprint decay, window length, and the
//!   per-signal weight table as one explicit value.
//! - Validate ranges at engine construction, never later.
//!
//! # Invariants
//! - No global or ambient mutable configuration state exists anywhere.
//! - `tau_mut <= tau_in`, both in [0, 1]; `ema_alpha` in [0, 1].
//! - `mutation_window_days` lies in [1, `MAX_MUTATION_WINDOW_DAYS`].
//! - Signal weights are finite and non-negative.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound on `mutation_window_days` (ten years).
///
/// Metric refresh subtracts the window from an observation timestamp; the
/// cap keeps that subtraction far inside chrono's representable datetime
/// range.
pub const MAX_MUTATION_WINDOW_DAYS: u32 = 3_650;

/// Configuration rejected at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A threshold or decay factor is outside [0, 1].
    OutOfUnitRange { name: &'static str, value: f64 },
    /// `tau_mut` exceeds `tau_in`, making the decision bands overlap.
    ThresholdOrder { tau_in: f64, tau_mut: f64 },
    /// The mutation window is zero or longer than `MAX_MUTATION_WINDOW_DAYS`.
    MutationWindowOutOfRange { value: u32 },
    /// A signal weight is negative, NaN, or infinite.
    InvalidSignalWeight { gap_id: String, value: f64 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfUnitRange { name, value } => {
                write!(f, "{name} must be within [0, 1], got {value}")
            }
            Self::ThresholdOrder { tau_in, tau_mut } => write!(
                f,
                "tau_mut ({tau_mut}) must not exceed tau_in ({tau_in})"
            ),
            Self::MutationWindowOutOfRange { value } => write!(
                f,
                "mutation_window_days must be within [1, {MAX_MUTATION_WINDOW_DAYS}], got {value}"
            ),
            Self::InvalidSignalWeight { gap_id, value } => write!(
                f,
                "signal weight for `{gap_id}` must be finite and non-negative, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Tunable parameters of the continuum engine.
///
/// All fields have working defaults; construction-time validation keeps a
/// bad value from ever reaching the decision path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumConfig {
    /// Similarity at or above which an observation continues the open
    /// interval. Default 0.85.
    pub tau_in: f64,
    /// Similarity at or above which (but below `tau_in`) an observation
    /// mutates the open interval. Default 0.60.
    pub tau_mut: f64,
    /// Fingerprint EMA decay; close to 1 biases toward stability.
    /// Default 0.7.
    pub ema_alpha: f64,
    /// Trailing window length for mutation metrics, in days; at most
    /// [`MAX_MUTATION_WINDOW_DAYS`]. Default 30.
    pub mutation_window_days: u32,
    /// Per-signal severity weights; unlisted signals weigh 1.0.
    pub signal_weights: BTreeMap<String, f64>,
}

impl Default for ContinuumConfig {
    fn default() -> Self {
        Self {
            tau_in: 0.85,
            tau_mut: 0.60,
            ema_alpha: 0.7,
            mutation_window_days: 30,
            signal_weights: default_signal_weights(),
        }
    }
}

impl ContinuumConfig {
    /// Checks all ranges and orderings.
    ///
    /// # Errors
    /// - Thresholds or `ema_alpha` outside [0, 1].
    /// - `tau_mut > tau_in`.
    /// - Mutation window outside [1, `MAX_MUTATION_WINDOW_DAYS`].
    /// - Negative or non-finite signal weight.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_range("tau_in", self.tau_in)?;
        check_unit_range("tau_mut", self.tau_mut)?;
        check_unit_range("ema_alpha", self.ema_alpha)?;
        if self.tau_mut > self.tau_in {
            return Err(ConfigError::ThresholdOrder {
                tau_in: self.tau_in,
                tau_mut: self.tau_mut,
            });
        }
        if !(1..=MAX_MUTATION_WINDOW_DAYS).contains(&self.mutation_window_days) {
            return Err(ConfigError::MutationWindowOutOfRange {
                value: self.mutation_window_days,
            });
        }
        for (gap_id, weight) in &self.signal_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::InvalidSignalWeight {
                    gap_id: gap_id.clone(),
                    value: *weight,
                });
            }
        }
        Ok(())
    }

    /// Severity weight for one signal id; unlisted signals weigh 1.0.
    pub fn weight_for(&self, gap_id: &str) -> f64 {
        self.signal_weights.get(gap_id).copied().unwrap_or(1.0)
    }
}

/// Built-in severity weight table for well-known absence signals.
pub fn default_signal_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("absence:evidence.training.disclosure".to_string(), 3.0),
        ("absence:license.traceability".to_string(), 2.5),
        ("absence:provenance.linkage".to_string(), 2.0),
        ("absence:model_card.completeness".to_string(), 1.5),
    ])
}

/// Minimum sizes a (day, signal) group must reach to be exported as a
/// cluster. Supplied per export call, not per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Minimum count of distinct entities in the group. Default 3.
    pub min_models: usize,
    /// Minimum count of mutation events in the group. Default 3.
    pub min_events: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_models: 3,
            min_events: 3,
        }
    }
}

fn check_unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}
