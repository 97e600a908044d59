//! Input observation records.
//!
//! # Responsibility
//! - Define the immutable absence/presence atoms fed into the engine.
//! - Validate structure before any interval state is touched.
//! - Own the ISO-8601 / UTC coercion at the wire boundary.
//!
//! # Invariants
//! - Atoms are consumed exactly once and never mutated after ingestion.
//! - In-memory timestamps are always UTC; offsets are converted, naive
//!   inputs are read as UTC.
//! - Validation is structural only: blank ids and non-finite numbers reject,
//!   out-of-range but finite strengths pass (clamped later at accumulation).

use crate::signal::SignalVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Serde codec for ISO-8601 timestamps at the wire boundary.
///
/// Offset-aware inputs are converted to UTC. Inputs without an offset are
/// interpreted as UTC: a documented convenience for upstream scanners, not
/// silent data loss.
pub mod iso_utc {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_utc(&raw).map_err(DeError::custom)
    }

    /// Parses one ISO-8601 timestamp string, coercing the result to UTC.
    pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
            return Ok(aware.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(|err| format!("invalid ISO-8601 timestamp `{raw}`: {err}"))
    }
}

/// Structural validation error for input atoms.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomValidationError {
    /// `entity_id` is empty or whitespace-only.
    MissingEntityId,
    /// `gap_id` is empty or whitespace-only.
    MissingGapId,
    /// `obs_strength` is NaN or infinite.
    NonFiniteStrength(f64),
    /// A signal-vector magnitude is NaN or infinite.
    NonFiniteSignal { name: String, value: f64 },
}

impl Display for AtomValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEntityId => write!(f, "entity_id must be a non-empty string"),
            Self::MissingGapId => write!(f, "gap_id must be a non-empty string"),
            Self::NonFiniteStrength(value) => {
                write!(f, "obs_strength must be finite, got {value}")
            }
            Self::NonFiniteSignal { name, value } => {
                write!(f, "signal_vector entry `{name}` must be finite, got {value}")
            }
        }
    }
}

impl Error for AtomValidationError {}

/// One timestamped negative observation about an entity on a signal.
///
/// Produced by an external scanning collaborator; the engine treats it as
/// read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsenceAtom {
    /// Observation timestamp, coerced to UTC at the wire boundary.
    #[serde(with = "iso_utc")]
    pub ts: DateTime<Utc>,
    /// Observed entity identifier.
    pub entity_id: String,
    /// Signal identifier naming what was found absent.
    pub gap_id: String,
    /// How hard the scanner looked, nominally in [0, 1].
    pub obs_strength: f64,
    /// Deterministic feature vector characterizing the observation.
    pub signal_vector: SignalVector,
    /// Snapshot/receipt identifiers backing the observation.
    pub evidence_refs: Vec<String>,
}

impl AbsenceAtom {
    pub fn new(
        ts: DateTime<Utc>,
        entity_id: impl Into<String>,
        gap_id: impl Into<String>,
        obs_strength: f64,
        signal_vector: SignalVector,
        evidence_refs: Vec<String>,
    ) -> Self {
        Self {
            ts,
            entity_id: entity_id.into(),
            gap_id: gap_id.into(),
            obs_strength,
            signal_vector,
            evidence_refs,
        }
    }

    /// Checks structural soundness of this atom.
    ///
    /// # Errors
    /// - Blank `entity_id` or `gap_id`.
    /// - Non-finite `obs_strength` or signal-vector magnitude.
    pub fn validate(&self) -> Result<(), AtomValidationError> {
        validate_ids(&self.entity_id, &self.gap_id)?;
        if !self.obs_strength.is_finite() {
            return Err(AtomValidationError::NonFiniteStrength(self.obs_strength));
        }
        for (name, value) in &self.signal_vector {
            if !value.is_finite() {
                return Err(AtomValidationError::NonFiniteSignal {
                    name: name.clone(),
                    value: *value,
                });
            }
        }
        Ok(())
    }
}

/// One timestamped positive observation that can close an open interval.
///
/// Optional input: deployments without presence scanning simply never close
/// intervals this way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceAtom {
    /// Observation timestamp, coerced to UTC at the wire boundary.
    #[serde(with = "iso_utc")]
    pub ts: DateTime<Utc>,
    /// Observed entity identifier.
    pub entity_id: String,
    /// Signal identifier naming what was found present.
    pub gap_id: String,
    /// Proof-of-presence identifiers.
    pub evidence_refs: Vec<String>,
}

impl PresenceAtom {
    pub fn new(
        ts: DateTime<Utc>,
        entity_id: impl Into<String>,
        gap_id: impl Into<String>,
        evidence_refs: Vec<String>,
    ) -> Self {
        Self {
            ts,
            entity_id: entity_id.into(),
            gap_id: gap_id.into(),
            evidence_refs,
        }
    }

    /// Checks structural soundness of this atom.
    ///
    /// # Errors
    /// - Blank `entity_id` or `gap_id`.
    pub fn validate(&self) -> Result<(), AtomValidationError> {
        validate_ids(&self.entity_id, &self.gap_id)
    }
}

fn validate_ids(entity_id: &str, gap_id: &str) -> Result<(), AtomValidationError> {
    if entity_id.trim().is_empty() {
        return Err(AtomValidationError::MissingEntityId);
    }
    if gap_id.trim().is_empty() {
        return Err(AtomValidationError::MissingGapId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{iso_utc, AbsenceAtom, AtomValidationError};
    use crate::signal::SignalVector;
    use chrono::{TimeZone, Utc};

    fn sample_atom() -> AbsenceAtom {
        let mut vector = SignalVector::new();
        vector.insert("f1".to_string(), 0.9);
        AbsenceAtom::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .expect("valid fixture timestamp"),
            "model-123",
            "absence:license.traceability",
            0.9,
            vector,
            vec!["scan-0".to_string()],
        )
    }

    #[test]
    fn parse_utc_accepts_offset_and_naive_forms() {
        let aware = iso_utc::parse_utc("2025-01-01T12:00:00+02:00").expect("offset form parses");
        assert_eq!(aware.to_rfc3339(), "2025-01-01T10:00:00+00:00");

        let naive = iso_utc::parse_utc("2025-01-01T12:00:00").expect("naive form parses");
        assert_eq!(naive.to_rfc3339(), "2025-01-01T12:00:00+00:00");
    }

    #[test]
    fn parse_utc_rejects_garbage() {
        let error = iso_utc::parse_utc("yesterday-ish").expect_err("non-ISO input must fail");
        assert!(error.contains("invalid ISO-8601"));
    }

    #[test]
    fn validate_accepts_well_formed_atom() {
        sample_atom().validate().expect("sample atom should be valid");
    }

    #[test]
    fn validate_rejects_blank_ids() {
        let mut atom = sample_atom();
        atom.entity_id = "   ".to_string();
        assert_eq!(
            atom.validate().expect_err("blank entity_id must fail"),
            AtomValidationError::MissingEntityId
        );

        let mut atom = sample_atom();
        atom.gap_id = String::new();
        assert_eq!(
            atom.validate().expect_err("blank gap_id must fail"),
            AtomValidationError::MissingGapId
        );
    }

    #[test]
    fn validate_rejects_non_finite_numbers() {
        let mut atom = sample_atom();
        atom.obs_strength = f64::NAN;
        assert!(matches!(
            atom.validate().expect_err("NaN strength must fail"),
            AtomValidationError::NonFiniteStrength(_)
        ));

        let mut atom = sample_atom();
        atom.signal_vector
            .insert("f2".to_string(), f64::INFINITY);
        assert!(matches!(
            atom.validate().expect_err("infinite signal must fail"),
            AtomValidationError::NonFiniteSignal { .. }
        ));
    }

    #[test]
    fn validate_passes_finite_out_of_range_strength() {
        // Clamping happens at accumulation time, not validation time.
        let mut atom = sample_atom();
        atom.obs_strength = 1.7;
        atom.validate()
            .expect("finite out-of-range strength should pass validation");
    }
}
