//! Temporal clustering of mutation events.
//!
//! # Responsibility
//! - Group mutation events by UTC calendar day and signal, and report the
//!   groups that touch enough distinct entities and events.
//!
//! # Invariants
//! - Grouping is purely structural: counts of entities and events, never
//!   an interpretation of what a dense day means.
//! - Output order is day-ascending, then signal-ascending.

use crate::config::ClusterParams;
use crate::model::event::MutationEvent;
use crate::model::interval::IntervalId;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One day-and-signal group of mutation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationCluster {
    pub date: NaiveDate,
    pub gap_id: String,
    pub models_affected: Vec<String>,
    pub unique_models: usize,
    pub mutation_events: usize,
    pub child_interval_ids: Vec<IntervalId>,
}

#[derive(Default)]
struct Bucket {
    models: BTreeSet<String>,
    children: Vec<IntervalId>,
}

/// Buckets events by (UTC day, gap_id) and keeps the buckets meeting both
/// minimums in `params`.
pub fn build_clusters<'a>(
    events: impl IntoIterator<Item = &'a MutationEvent>,
    params: ClusterParams,
) -> Vec<MutationCluster> {
    let mut buckets: BTreeMap<(NaiveDate, String), Bucket> = BTreeMap::new();
    for event in events {
        let bucket = buckets
            .entry((event.ts.date_naive(), event.gap_id.clone()))
            .or_default();
        bucket.models.insert(event.entity_id.clone());
        bucket.children.push(event.child_interval_id);
    }

    buckets
        .into_iter()
        .filter(|(_, bucket)| {
            bucket.models.len() >= params.min_models && bucket.children.len() >= params.min_events
        })
        .map(|((date, gap_id), bucket)| MutationCluster {
            date,
            gap_id,
            unique_models: bucket.models.len(),
            mutation_events: bucket.children.len(),
            models_affected: bucket.models.into_iter().collect(),
            child_interval_ids: bucket.children,
        })
        .collect()
}
