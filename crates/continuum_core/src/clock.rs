//! Injected time source.
//!
//! Windowed mutation metrics for open intervals are measured against "now".
//! Keeping "now" behind a trait keeps the engine deterministic under test
//! and free of direct system-time reads.

use chrono::{DateTime, Utc};
use std::cell::Cell;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Production clock reading real UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests and replays.
///
/// Interior mutability lets a test keep ownership while the engine holds a
/// shared reference, advancing time between ingestions.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Cell::new(instant),
        }
    }

    /// Moves the reported instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.instant.set(instant);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant.get()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, SystemClock};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn fixed_clock_reports_and_moves_its_instant() {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixture timestamp");
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        let later = start + Duration::days(10);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn clock_impl_passes_through_references() {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixture timestamp");
        let clock = FixedClock::new(start);
        let by_ref: &FixedClock = &clock;
        assert_eq!(by_ref.now(), start);
    }

    #[test]
    fn system_clock_is_monotonic_enough_for_smoke() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }
}
