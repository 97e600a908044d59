//! Interval collection and open-interval index.
//!
//! # Responsibility
//! - Own every interval ever created, in insertion order, for the full
//!   process lifetime.
//! - Answer open-interval lookups per (entity, signal) key in O(1).
//!
//! # Invariants
//! - At most one open interval exists per (entity_id, gap_id) key.
//! - Intervals are never removed; closure is the only lifecycle exit.
//! - All closures go through `close_interval` so the open index can never
//!   drift from interval state.

use crate::model::interval::{ClosureReason, GapInterval, IntervalId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failures.
///
/// These signal engine bugs or misuse of the store contract, not bad caller
/// input; the engine surfaces them wrapped in its own error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(IntervalId),
    AlreadyClosed(IntervalId),
    DuplicateId(IntervalId),
    OpenSlotOccupied { entity_id: String, gap_id: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "interval not found: {id}"),
            Self::AlreadyClosed(id) => write!(f, "interval already closed: {id}"),
            Self::DuplicateId(id) => write!(f, "interval id already present: {id}"),
            Self::OpenSlotOccupied { entity_id, gap_id } => write!(
                f,
                "an open interval already exists for entity `{entity_id}` signal `{gap_id}`"
            ),
        }
    }
}

impl Error for StoreError {}

type OpenKey = (String, String);

fn open_key(entity_id: &str, gap_id: &str) -> OpenKey {
    (entity_id.to_string(), gap_id.to_string())
}

/// All intervals, open and closed, plus the per-key open index.
#[derive(Debug, Default)]
pub struct IntervalStore {
    /// Append-only; position is stable for the process lifetime.
    intervals: Vec<GapInterval>,
    by_id: HashMap<IntervalId, usize>,
    open_by_key: HashMap<OpenKey, IntervalId>,
}

impl IntervalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly created interval.
    ///
    /// # Errors
    /// - `DuplicateId` when the id is already present.
    /// - `OpenSlotOccupied` when the interval is open and its key already
    ///   holds an open interval.
    pub fn insert(&mut self, interval: GapInterval) -> StoreResult<IntervalId> {
        if self.by_id.contains_key(&interval.id) {
            return Err(StoreError::DuplicateId(interval.id));
        }

        let key = open_key(&interval.entity_id, &interval.gap_id);
        if interval.is_open() && self.open_by_key.contains_key(&key) {
            return Err(StoreError::OpenSlotOccupied {
                entity_id: interval.entity_id.clone(),
                gap_id: interval.gap_id.clone(),
            });
        }

        let id = interval.id;
        let position = self.intervals.len();
        if interval.is_open() {
            self.open_by_key.insert(key, id);
        }
        self.by_id.insert(id, position);
        self.intervals.push(interval);
        Ok(id)
    }

    /// The open interval for a key, if any.
    pub fn open_interval(&self, entity_id: &str, gap_id: &str) -> Option<&GapInterval> {
        let id = self.open_by_key.get(&open_key(entity_id, gap_id))?;
        self.get(*id)
    }

    /// Mutable access to the open interval for a key, if any.
    pub fn open_interval_mut(&mut self, entity_id: &str, gap_id: &str) -> Option<&mut GapInterval> {
        let id = *self.open_by_key.get(&open_key(entity_id, gap_id))?;
        self.get_mut(id)
    }

    /// Closes an interval and releases its open slot.
    ///
    /// This is the sole closure path; callers must not set `end` through
    /// `get_mut`.
    ///
    /// # Errors
    /// - `NotFound` for an unknown id.
    /// - `AlreadyClosed` when the interval was closed earlier.
    pub fn close_interval(
        &mut self,
        id: IntervalId,
        end: DateTime<Utc>,
        reason: ClosureReason,
    ) -> StoreResult<()> {
        let position = *self.by_id.get(&id).ok_or(StoreError::NotFound(id))?;
        let interval = &mut self.intervals[position];
        if !interval.close(end, reason) {
            return Err(StoreError::AlreadyClosed(id));
        }
        let key = open_key(&interval.entity_id, &interval.gap_id);
        self.open_by_key.remove(&key);
        Ok(())
    }

    pub fn get(&self, id: IntervalId) -> Option<&GapInterval> {
        self.by_id.get(&id).map(|position| &self.intervals[*position])
    }

    pub fn get_mut(&mut self, id: IntervalId) -> Option<&mut GapInterval> {
        let position = *self.by_id.get(&id)?;
        Some(&mut self.intervals[position])
    }

    /// Iterates every interval in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, GapInterval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
