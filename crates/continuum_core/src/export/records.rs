//! Serialized report shapes for intervals and mutation events.
//!
//! # Responsibility
//! - Flatten engine state into stable, externally consumable records.
//! - Apply the wire conventions the records promise: `crovia_id` naming,
//!   RFC 3339 timestamps, six-decimal rounding, sorted deduplicated
//!   evidence lists.
//!
//! # Invariants
//! - The interval record always carries nineteen keys; the two windowed
//!   mutation keys embed the configured window length in their names.
//! - Records are snapshots: building them never touches engine state.

use crate::model::atom::iso_utc;
use crate::model::event::MutationEvent;
use crate::model::interval::{ClosureReason, GapInterval, GapLevel, IntervalId};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

/// Export form of one interval.
///
/// `window_days` parameterizes the names of the windowed mutation keys and
/// is not itself an exported key.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub interval_id: IntervalId,
    pub crovia_id: String,
    pub gap_id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub level: GapLevel,
    pub severity: f64,
    pub confidence: f64,
    pub days_open: u32,
    pub observations: u32,
    pub obs_strength_avg: f64,
    pub parent_interval: Option<IntervalId>,
    pub lineage: Vec<IntervalId>,
    pub mutation_count_total: u32,
    pub mutations_in_window: u32,
    pub mutation_density: f64,
    pub window_days: u32,
    pub evidence_refs: Vec<String>,
    pub closure_reason: Option<ClosureReason>,
    pub closure_evidence_refs: Vec<String>,
}

impl IntervalRecord {
    pub fn from_interval(interval: &GapInterval, window_days: u32) -> Self {
        Self {
            interval_id: interval.id,
            crovia_id: interval.entity_id.clone(),
            gap_id: interval.gap_id.clone(),
            start: interval.start,
            end: interval.end,
            level: interval.level,
            severity: round6(interval.severity),
            confidence: round6(interval.confidence),
            days_open: interval.persistence_days,
            observations: interval.observations,
            obs_strength_avg: round6(interval.obs_strength_avg),
            parent_interval: interval.parent_interval,
            lineage: interval.lineage.clone(),
            mutation_count_total: interval.mutation_count_total,
            mutations_in_window: interval.mutations_in_window,
            mutation_density: round6(interval.mutation_density),
            window_days,
            evidence_refs: sorted_unique(&interval.evidence_refs),
            closure_reason: interval.closure_reason,
            closure_evidence_refs: sorted_unique(&interval.closure_evidence_refs),
        }
    }
}

impl Serialize for IntervalRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(19))?;
        map.serialize_entry("interval_id", &self.interval_id)?;
        map.serialize_entry("crovia_id", &self.crovia_id)?;
        map.serialize_entry("gap_id", &self.gap_id)?;
        map.serialize_entry("start", &self.start.to_rfc3339())?;
        map.serialize_entry("end", &self.end.map(|end| end.to_rfc3339()))?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("severity", &self.severity)?;
        map.serialize_entry("confidence", &self.confidence)?;
        map.serialize_entry("days_open", &self.days_open)?;
        map.serialize_entry("observations", &self.observations)?;
        map.serialize_entry("obs_strength_avg", &self.obs_strength_avg)?;
        map.serialize_entry("parent_interval", &self.parent_interval)?;
        map.serialize_entry("lineage", &self.lineage)?;
        map.serialize_entry("mutation_count_total", &self.mutation_count_total)?;
        map.serialize_entry(
            &format!("mutations_{}d", self.window_days),
            &self.mutations_in_window,
        )?;
        map.serialize_entry(
            &format!("mutation_density_{}d", self.window_days),
            &self.mutation_density,
        )?;
        map.serialize_entry("evidence_refs", &self.evidence_refs)?;
        map.serialize_entry("closure_reason", &self.closure_reason)?;
        map.serialize_entry("closure_evidence_refs", &self.closure_evidence_refs)?;
        map.end()
    }
}

/// Export form of one mutation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationEventRecord {
    #[serde(with = "iso_utc")]
    pub ts: DateTime<Utc>,
    pub crovia_id: String,
    pub gap_id: String,
    pub parent_interval_id: IntervalId,
    pub child_interval_id: IntervalId,
}

impl From<&MutationEvent> for MutationEventRecord {
    fn from(event: &MutationEvent) -> Self {
        Self {
            ts: event.ts,
            crovia_id: event.entity_id.clone(),
            gap_id: event.gap_id.clone(),
            parent_interval_id: event.parent_interval_id,
            child_interval_id: event.child_interval_id,
        }
    }
}

/// Rounds to six decimal places, the precision the records promise.
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

fn sorted_unique(values: &[String]) -> Vec<String> {
    let unique: BTreeSet<&String> = values.iter().collect();
    unique.into_iter().cloned().collect()
}
