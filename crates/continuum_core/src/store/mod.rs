//! In-memory state owned by the engine.
//!
//! # Responsibility
//! - Hold the full interval history and the mutation event stream.
//! - Enforce the one-open-interval-per-key and append-only invariants.
//!
//! # Invariants
//! - All mutation happens through the ingestion engine's decision path,
//!   never directly by callers.

pub mod interval_store;
pub mod mutation_log;
