//! Mutation transition records.

use crate::model::interval::IntervalId;
use chrono::{DateTime, Utc};

/// One parent-to-child interval transition.
///
/// Created only as a side effect of a mutation decision; never mutated or
/// deleted afterwards. The append-only event stream is the substrate for
/// windowed mutation metrics and temporal clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    /// Timestamp of the absence atom that triggered the mutation.
    pub ts: DateTime<Utc>,
    pub entity_id: String,
    pub gap_id: String,
    pub parent_interval_id: IntervalId,
    pub child_interval_id: IntervalId,
}
