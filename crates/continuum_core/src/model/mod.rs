//! Domain model for absence tracking.
//!
//! # Responsibility
//! - Define input atoms, gap intervals, and mutation events.
//! - Keep wire-boundary coercion and structural validation next to the data.
//!
//! # Invariants
//! - Every interval is identified by a stable `IntervalId`.
//! - History is append-only: intervals close, they are never deleted.

pub mod atom;
pub mod event;
pub mod interval;
