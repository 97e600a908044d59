//! Injected interval id allocation.
//!
//! Interval ids must be collision-resistant but need not be random: tests
//! and reproducible pipelines inject a deterministic generator instead.

use crate::model::interval::IntervalId;
use uuid::Uuid;

/// Allocator for new interval ids.
pub trait IdGenerator {
    fn next_id(&mut self) -> IntervalId;
}

/// Production generator yielding random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&mut self) -> IntervalId {
        Uuid::new_v4()
    }
}

/// Deterministic generator yielding ascending ids starting at 1.
#[derive(Debug, Clone)]
pub struct SequenceIdGenerator {
    next: u64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&mut self) -> IntervalId {
        let id = Uuid::from_u128(u128::from(self.next));
        self.next += 1;
        id
    }
}
