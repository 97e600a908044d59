//! Gap interval domain model.
//!
//! # Responsibility
//! - Define the core mutable entity tracking one unresolved absence.
//! - Provide lifecycle helpers for monotonic closure and persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another interval.
//! - `end == None` means open; once `end` is set it is never cleared.
//! - `persistence_days >= 1` and never decreases while the interval lives.
//! - `lineage` lists ancestor interval ids oldest-first.

use crate::signal::SignalVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every gap interval.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type IntervalId = Uuid;

/// Coarse escalation label derived from severity.
///
/// Purely numeric thresholds; attaches no intent or legal judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapLevel {
    /// Default level for fresh or low-severity intervals.
    Observed,
    /// Severity above 0.40.
    Persistent,
    /// Severity above 0.65.
    Structural,
    /// Severity above 0.85.
    Systemic,
}

impl GapLevel {
    /// Stable string used in exports and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observed => "OBSERVED",
            Self::Persistent => "PERSISTENT",
            Self::Structural => "STRUCTURAL",
            Self::Systemic => "SYSTEMIC",
        }
    }
}

/// Why a closed interval was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureReason {
    /// A positive observation resolved the absence.
    ClosureByPresence,
    /// A newer absence observation superseded this interval.
    ClosureByMutation,
}

impl ClosureReason {
    /// Stable string used in exports and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClosureByPresence => "closure_by_presence",
            Self::ClosureByMutation => "closure_by_mutation",
        }
    }
}

/// The tracked lifespan of one unresolved absence for an (entity, signal)
/// pair.
///
/// Created on "open new" or as the successor half of a mutation, mutated in
/// place on "continue" or closure, never deleted: the full history stays in
/// the store for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct GapInterval {
    pub id: IntervalId,
    pub entity_id: String,
    pub gap_id: String,

    pub start: DateTime<Utc>,
    /// `None` while the interval is open.
    pub end: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,

    /// Whole days spanned from `start` to `last_seen`, inclusive, >= 1.
    pub persistence_days: u32,
    pub observations: u32,
    pub obs_strength_sum: f64,
    pub obs_strength_avg: f64,

    pub severity: f64,
    pub level: GapLevel,
    pub confidence: f64,

    /// Immediate predecessor when this interval was opened by a mutation.
    pub parent_interval: Option<IntervalId>,
    /// Ancestor interval ids, oldest first.
    pub lineage: Vec<IntervalId>,
    /// Distinct mutation transitions along the lineage up to this interval.
    pub mutation_count_total: u32,
    /// Mutation events for this key inside the trailing window.
    pub mutations_in_window: u32,
    /// `mutations_in_window / window length in days`.
    pub mutation_density: f64,

    /// Running feature-vector EMA used for similarity comparison.
    pub fingerprint: SignalVector,
    /// Accumulated evidence references; deduplicated only at export.
    pub evidence_refs: Vec<String>,

    pub closure_reason: Option<ClosureReason>,
    pub closure_evidence_refs: Vec<String>,
}

impl GapInterval {
    /// Returns whether this interval is still open.
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Closes this interval at `end` for `reason`.
    ///
    /// Returns `false` when the interval is already closed, leaving it
    /// untouched: closure is monotonic. `last_seen` snaps to the closing
    /// timestamp and persistence is refreshed.
    pub fn close(&mut self, end: DateTime<Utc>, reason: ClosureReason) -> bool {
        if self.end.is_some() {
            return false;
        }
        self.end = Some(end);
        self.last_seen = end;
        self.closure_reason = Some(reason);
        self.refresh_persistence();
        true
    }

    /// Recomputes `persistence_days` from `start` and `last_seen`.
    ///
    /// The value counts both endpoint days, floors at 1, and never
    /// decreases, so a contract-violating out-of-order timestamp cannot
    /// shrink derived scores.
    pub fn refresh_persistence(&mut self) {
        let spanned = (self.last_seen - self.start).num_days() + 1;
        let clamped = spanned.max(1);
        if clamped > i64::from(self.persistence_days) {
            self.persistence_days = u32::try_from(clamped).unwrap_or(u32::MAX);
        }
    }
}
