//! Append-only mutation event log.
//!
//! # Responsibility
//! - Record every parent-to-child transition in append order.
//! - Answer windowed per-key counts for mutation metrics.
//!
//! # Invariants
//! - Events are never mutated or removed once appended.
//! - Window bounds are inclusive on both ends.

use crate::model::event::MutationEvent;
use chrono::{DateTime, Utc};

/// Append-only record of mutation transitions.
#[derive(Debug, Default)]
pub struct MutationLog {
    events: Vec<MutationEvent>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: MutationEvent) {
        self.events.push(event);
    }

    /// Iterates events in append order.
    pub fn iter(&self) -> std::slice::Iter<'_, MutationEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[MutationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Counts this key's events with `t0 <= ts <= t1`.
    pub fn count_in_window(
        &self,
        entity_id: &str,
        gap_id: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> u32 {
        let mut count = 0u32;
        for event in &self.events {
            if event.entity_id == entity_id
                && event.gap_id == gap_id
                && event.ts >= t0
                && event.ts <= t1
            {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::MutationLog;
    use crate::model::event::MutationEvent;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn fixture_ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixture timestamp")
            + Duration::days(day)
    }

    fn event(day: i64, entity_id: &str, gap_id: &str) -> MutationEvent {
        MutationEvent {
            ts: fixture_ts(day),
            entity_id: entity_id.to_string(),
            gap_id: gap_id.to_string(),
            parent_interval_id: Uuid::from_u128(1),
            child_interval_id: Uuid::from_u128(2),
        }
    }

    #[test]
    fn count_in_window_is_inclusive_on_both_ends() {
        let mut log = MutationLog::new();
        log.append(event(0, "model-a", "absence:x"));
        log.append(event(5, "model-a", "absence:x"));
        log.append(event(10, "model-a", "absence:x"));

        assert_eq!(
            log.count_in_window("model-a", "absence:x", fixture_ts(0), fixture_ts(10)),
            3
        );
        assert_eq!(
            log.count_in_window("model-a", "absence:x", fixture_ts(1), fixture_ts(9)),
            1
        );
        assert_eq!(
            log.count_in_window("model-a", "absence:x", fixture_ts(5), fixture_ts(5)),
            1
        );
    }

    #[test]
    fn count_in_window_filters_by_key() {
        let mut log = MutationLog::new();
        log.append(event(1, "model-a", "absence:x"));
        log.append(event(1, "model-b", "absence:x"));
        log.append(event(1, "model-a", "absence:y"));

        assert_eq!(
            log.count_in_window("model-a", "absence:x", fixture_ts(0), fixture_ts(2)),
            1
        );
        assert_eq!(log.len(), 3);
    }
}
