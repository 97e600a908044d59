//! Core engine for tracking recurring absence observations as long-lived
//! gap intervals. This crate is the single source of truth for the interval
//! lifecycle, scoring, and export invariants.

pub mod clock;
pub mod config;
pub mod engine;
pub mod export;
pub mod ids;
pub mod logging;
pub mod model;
pub mod scoring;
pub mod signal;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClusterParams, ConfigError, ContinuumConfig, MAX_MUTATION_WINDOW_DAYS};
pub use engine::continuum::{
    ContinuumEngine, EngineError, EngineResult, IngestAction, IngestOutcome,
};
pub use export::clusters::MutationCluster;
pub use export::records::{IntervalRecord, MutationEventRecord};
pub use ids::{IdGenerator, SequenceIdGenerator, UuidIdGenerator};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::atom::{AbsenceAtom, AtomValidationError, PresenceAtom};
pub use model::event::MutationEvent;
pub use model::interval::{ClosureReason, GapInterval, GapLevel, IntervalId};
pub use signal::SignalVector;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
