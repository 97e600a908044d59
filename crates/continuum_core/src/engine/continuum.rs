//! Ingestion decision engine.
//!
//! # Responsibility
//! - Decide continue / mutate / open-new for every absence observation.
//! - Close intervals on presence observations.
//! - Keep derived scores and mutation metrics current after each decision.
//!
//! # Invariants
//! - Every decision compares strictly against the single open interval of
//!   the atom's (entity_id, gap_id) key, never an aggregate.
//! - A parent interval is always closed before its successor opens.
//! - Mutation events are appended only by the mutate decision, and the
//!   child's scores are recomputed after the append so its window metrics
//!   see the fresh event.
//! - Callers feed atoms in non-decreasing timestamp order per key; the
//!   engine does not reorder or reject late arrivals.

use crate::clock::{Clock, SystemClock};
use crate::config::{ClusterParams, ConfigError, ContinuumConfig};
use crate::export::clusters::{build_clusters, MutationCluster};
use crate::export::records::{IntervalRecord, MutationEventRecord};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::model::atom::{AbsenceAtom, AtomValidationError, PresenceAtom};
use crate::model::event::MutationEvent;
use crate::model::interval::{ClosureReason, GapInterval, GapLevel, IntervalId};
use crate::scoring::{compute_confidence, compute_severity, promote_level};
use crate::signal::{cosine_similarity, update_fingerprint};
use crate::store::interval_store::{IntervalStore, StoreError};
use crate::store::mutation_log::MutationLog;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error surfaced to callers.
#[derive(Debug)]
pub enum EngineError {
    /// Rejected configuration at construction.
    Config(ConfigError),
    /// Structurally invalid input atom.
    Atom(AtomValidationError),
    /// Internal store contract breach; indicates an engine bug.
    Store(StoreError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Atom(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Atom(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<AtomValidationError> for EngineError {
    fn from(value: AtomValidationError) -> Self {
        Self::Atom(value)
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// What `ingest_absence` did with the atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestAction {
    /// The open interval absorbed the observation.
    Continued,
    /// The open interval was closed and a linked successor opened.
    Mutated { closed_parent: IntervalId },
    /// A fresh unparented interval opened. `displaced` names the stale open
    /// interval that was closed to free the key's open slot, when one
    /// existed.
    Opened { displaced: Option<IntervalId> },
}

/// Result envelope of one absence ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The interval now carrying the observation (open after the call).
    pub interval_id: IntervalId,
    pub action: IngestAction,
}

enum Decision {
    Continue { id: IntervalId, similarity: f64 },
    Mutate { parent_id: IntervalId, similarity: f64 },
    Displace { stale_id: IntervalId, similarity: f64 },
    OpenFresh,
}

/// Interval lifecycle state machine over an in-memory store.
///
/// Single-threaded and synchronous: each ingestion fully completes,
/// including score recomputation, before returning. The clock and id
/// generator are injected so replays and tests stay deterministic.
pub struct ContinuumEngine<C: Clock, G: IdGenerator> {
    config: ContinuumConfig,
    clock: C,
    ids: G,
    store: IntervalStore,
    mutations: MutationLog,
}

impl ContinuumEngine<SystemClock, UuidIdGenerator> {
    /// Creates an engine on the system clock with random v4 interval ids.
    ///
    /// # Errors
    /// - `EngineError::Config` when the configuration fails validation.
    pub fn try_new(config: ContinuumConfig) -> EngineResult<Self> {
        Self::try_with_runtime(config, SystemClock, UuidIdGenerator)
    }
}

impl<C: Clock, G: IdGenerator> ContinuumEngine<C, G> {
    /// Creates an engine with an injected clock and id generator.
    ///
    /// # Errors
    /// - `EngineError::Config` when the configuration fails validation.
    pub fn try_with_runtime(config: ContinuumConfig, clock: C, ids: G) -> EngineResult<Self> {
        config.validate()?;
        info!(
            "event=engine_init module=engine status=ok tau_in={} tau_mut={} ema_alpha={} window_days={} weighted_signals={}",
            config.tau_in,
            config.tau_mut,
            config.ema_alpha,
            config.mutation_window_days,
            config.signal_weights.len()
        );
        Ok(Self {
            config,
            clock,
            ids,
            store: IntervalStore::new(),
            mutations: MutationLog::new(),
        })
    }

    /// Ingests one negative observation.
    ///
    /// Scores the atom against the open interval of its key and either
    /// continues it (similarity >= `tau_in`), mutates it (similarity >=
    /// `tau_mut`), or opens a fresh unparented interval. When a fresh open
    /// displaces a low-similarity stale interval, the stale one is closed
    /// first so the key never holds two open intervals.
    ///
    /// # Errors
    /// - `EngineError::Atom` when the atom fails structural validation.
    pub fn ingest_absence(&mut self, atom: &AbsenceAtom) -> EngineResult<IngestOutcome> {
        atom.validate()?;

        match self.classify(atom) {
            Decision::Continue { id, similarity } => {
                self.continue_interval(id, atom)?;
                debug!(
                    "event=absence_ingested module=engine status=ok action=continued interval_id={id} similarity={similarity}"
                );
                Ok(IngestOutcome {
                    interval_id: id,
                    action: IngestAction::Continued,
                })
            }
            Decision::Mutate {
                parent_id,
                similarity,
            } => {
                let child_id = self.mutate_interval(parent_id, atom)?;
                debug!(
                    "event=absence_ingested module=engine status=ok action=mutated parent_interval_id={parent_id} child_interval_id={child_id} similarity={similarity}"
                );
                Ok(IngestOutcome {
                    interval_id: child_id,
                    action: IngestAction::Mutated {
                        closed_parent: parent_id,
                    },
                })
            }
            Decision::Displace {
                stale_id,
                similarity,
            } => {
                self.displace_interval(stale_id, atom)?;
                let id = self.open_new_interval(atom, None, Vec::new())?;
                debug!(
                    "event=absence_ingested module=engine status=ok action=opened interval_id={id} displaced_interval_id={stale_id} similarity={similarity}"
                );
                Ok(IngestOutcome {
                    interval_id: id,
                    action: IngestAction::Opened {
                        displaced: Some(stale_id),
                    },
                })
            }
            Decision::OpenFresh => {
                let id = self.open_new_interval(atom, None, Vec::new())?;
                debug!(
                    "event=absence_ingested module=engine status=ok action=opened interval_id={id}"
                );
                Ok(IngestOutcome {
                    interval_id: id,
                    action: IngestAction::Opened { displaced: None },
                })
            }
        }
    }

    /// Ingests one positive observation, closing the key's open interval.
    ///
    /// Returns `Ok(None)` when the key has no open interval: presence
    /// without a prior absence is not an error, there is just nothing to
    /// close. History recorded before the closure is never altered.
    ///
    /// # Errors
    /// - `EngineError::Atom` when the atom fails structural validation.
    pub fn ingest_presence(&mut self, atom: &PresenceAtom) -> EngineResult<Option<IntervalId>> {
        atom.validate()?;
        let now = self.clock.now();

        let open_id = match self.store.open_interval(&atom.entity_id, &atom.gap_id) {
            Some(interval) => interval.id,
            None => {
                debug!(
                    "event=presence_ingested module=engine status=ok action=none entity_id={} gap_id={}",
                    atom.entity_id, atom.gap_id
                );
                return Ok(None);
            }
        };

        self.store
            .close_interval(open_id, atom.ts, ClosureReason::ClosureByPresence)?;
        let interval = self
            .store
            .get_mut(open_id)
            .ok_or(StoreError::NotFound(open_id))?;
        interval
            .closure_evidence_refs
            .extend(atom.evidence_refs.iter().cloned());
        Self::recalc_scores(interval, &self.config, &self.mutations, now);
        debug!(
            "event=presence_ingested module=engine status=ok action=closed interval_id={open_id} reason={}",
            ClosureReason::ClosureByPresence.as_str()
        );
        Ok(Some(open_id))
    }

    /// One record per interval, open and closed, in insertion order.
    pub fn export_intervals(&self) -> Vec<IntervalRecord> {
        self.store
            .iter()
            .map(|interval| {
                IntervalRecord::from_interval(interval, self.config.mutation_window_days)
            })
            .collect()
    }

    /// One record per mutation event, in append order.
    pub fn export_mutation_events(&self) -> Vec<MutationEventRecord> {
        self.mutations.iter().map(MutationEventRecord::from).collect()
    }

    /// Day-and-signal groups of mutation events meeting the given minimums.
    pub fn export_mutation_clusters(&self, params: ClusterParams) -> Vec<MutationCluster> {
        build_clusters(self.mutations.iter(), params)
    }

    pub fn interval(&self, id: IntervalId) -> Option<&GapInterval> {
        self.store.get(id)
    }

    /// The open interval for a key, if any.
    pub fn open_interval(&self, entity_id: &str, gap_id: &str) -> Option<&GapInterval> {
        self.store.open_interval(entity_id, gap_id)
    }

    /// Iterates every interval in insertion order.
    pub fn intervals(&self) -> std::slice::Iter<'_, GapInterval> {
        self.store.iter()
    }

    pub fn mutation_events(&self) -> &[MutationEvent] {
        self.mutations.as_slice()
    }

    pub fn config(&self) -> &ContinuumConfig {
        &self.config
    }

    fn classify(&self, atom: &AbsenceAtom) -> Decision {
        let open = match self.store.open_interval(&atom.entity_id, &atom.gap_id) {
            Some(interval) => interval,
            None => return Decision::OpenFresh,
        };

        let similarity = cosine_similarity(&atom.signal_vector, &open.fingerprint);
        if similarity >= self.config.tau_in {
            Decision::Continue {
                id: open.id,
                similarity,
            }
        } else if similarity >= self.config.tau_mut {
            Decision::Mutate {
                parent_id: open.id,
                similarity,
            }
        } else {
            Decision::Displace {
                stale_id: open.id,
                similarity,
            }
        }
    }

    fn continue_interval(&mut self, id: IntervalId, atom: &AbsenceAtom) -> EngineResult<()> {
        let now = self.clock.now();
        let interval = self.store.get_mut(id).ok_or(StoreError::NotFound(id))?;
        interval.last_seen = atom.ts;
        interval.refresh_persistence();
        interval.observations += 1;
        interval.obs_strength_sum += clamped_strength(atom.obs_strength);
        interval.fingerprint =
            update_fingerprint(&interval.fingerprint, &atom.signal_vector, self.config.ema_alpha);
        interval
            .evidence_refs
            .extend(atom.evidence_refs.iter().cloned());
        Self::recalc_scores(interval, &self.config, &self.mutations, now);
        Ok(())
    }

    fn mutate_interval(
        &mut self,
        parent_id: IntervalId,
        atom: &AbsenceAtom,
    ) -> EngineResult<IntervalId> {
        let now = self.clock.now();

        // Close the parent one second before the atom so parent and child
        // can never overlap.
        self.store.close_interval(
            parent_id,
            atom.ts - Duration::seconds(1),
            ClosureReason::ClosureByMutation,
        )?;

        let lineage = {
            let parent = self
                .store
                .get_mut(parent_id)
                .ok_or(StoreError::NotFound(parent_id))?;
            Self::recalc_scores(parent, &self.config, &self.mutations, now);
            let mut lineage = parent.lineage.clone();
            lineage.push(parent.id);
            lineage
        };

        let child_id = self.open_new_interval(atom, Some(parent_id), lineage)?;

        self.mutations.append(MutationEvent {
            ts: atom.ts,
            entity_id: atom.entity_id.clone(),
            gap_id: atom.gap_id.clone(),
            parent_interval_id: parent_id,
            child_interval_id: child_id,
        });

        // The child scored once before the event existed; refresh so its
        // window metrics count the transition that just created it.
        let child = self
            .store
            .get_mut(child_id)
            .ok_or(StoreError::NotFound(child_id))?;
        Self::recalc_scores(child, &self.config, &self.mutations, now);
        Ok(child_id)
    }

    /// Closes a stale open interval whose fingerprint no longer matches the
    /// stream, freeing the key's open slot for an unparented successor.
    ///
    /// No mutation event is appended and no lineage is formed: below
    /// `tau_mut` the observations are treated as unrelated.
    fn displace_interval(&mut self, stale_id: IntervalId, atom: &AbsenceAtom) -> EngineResult<()> {
        let now = self.clock.now();
        self.store.close_interval(
            stale_id,
            atom.ts - Duration::seconds(1),
            ClosureReason::ClosureByMutation,
        )?;
        let stale = self
            .store
            .get_mut(stale_id)
            .ok_or(StoreError::NotFound(stale_id))?;
        Self::recalc_scores(stale, &self.config, &self.mutations, now);
        Ok(())
    }

    fn open_new_interval(
        &mut self,
        atom: &AbsenceAtom,
        parent: Option<IntervalId>,
        lineage: Vec<IntervalId>,
    ) -> EngineResult<IntervalId> {
        let now = self.clock.now();
        let id = self.ids.next_id();
        let mut interval = GapInterval {
            id,
            entity_id: atom.entity_id.clone(),
            gap_id: atom.gap_id.clone(),
            start: atom.ts,
            end: None,
            last_seen: atom.ts,
            persistence_days: 1,
            observations: 1,
            obs_strength_sum: clamped_strength(atom.obs_strength),
            obs_strength_avg: 0.0,
            severity: 0.0,
            level: GapLevel::Observed,
            confidence: 0.0,
            parent_interval: parent,
            lineage,
            mutation_count_total: 0,
            mutations_in_window: 0,
            mutation_density: 0.0,
            fingerprint: atom.signal_vector.clone(),
            evidence_refs: atom.evidence_refs.clone(),
            closure_reason: None,
            closure_evidence_refs: Vec::new(),
        };
        Self::recalc_scores(&mut interval, &self.config, &self.mutations, now);
        let level = interval.level;
        self.store.insert(interval)?;
        debug!(
            "event=interval_opened module=engine status=ok interval_id={id} level={} parented={}",
            level.as_str(),
            parent.is_some()
        );
        Ok(id)
    }

    fn recalc_scores(
        interval: &mut GapInterval,
        config: &ContinuumConfig,
        mutations: &MutationLog,
        now: DateTime<Utc>,
    ) {
        interval.severity = compute_severity(
            interval.persistence_days,
            interval.observations,
            config.weight_for(&interval.gap_id),
        );
        interval.level = promote_level(interval.severity);
        interval.obs_strength_avg =
            interval.obs_strength_sum / f64::from(interval.observations.max(1));
        interval.confidence = compute_confidence(interval.obs_strength_avg, interval.observations);
        Self::refresh_mutation_metrics(interval, config, mutations, now);
    }

    fn refresh_mutation_metrics(
        interval: &mut GapInterval,
        config: &ContinuumConfig,
        mutations: &MutationLog,
        now: DateTime<Utc>,
    ) {
        let mut chain: BTreeSet<IntervalId> = interval.lineage.iter().copied().collect();
        if let Some(parent_id) = interval.parent_interval {
            chain.insert(parent_id);
        }
        interval.mutation_count_total = u32::try_from(chain.len()).unwrap_or(u32::MAX);

        // Open intervals measure the window against "now"; closed ones
        // against their closing timestamp.
        let reference = interval.end.unwrap_or(now);
        let window_start = reference - Duration::days(i64::from(config.mutation_window_days));
        interval.mutations_in_window = mutations.count_in_window(
            &interval.entity_id,
            &interval.gap_id,
            window_start,
            reference,
        );
        interval.mutation_density = f64::from(interval.mutations_in_window)
            / f64::from(config.mutation_window_days.max(1));
    }
}

/// Clamps one observation strength into [0, 1] before accumulation.
///
/// A single out-of-range sample must not distort aggregate scores, so it is
/// clamped rather than rejected; the anomaly is still worth a log line.
fn clamped_strength(raw: f64) -> f64 {
    let clamped = raw.clamp(0.0, 1.0);
    if clamped != raw {
        warn!(
            "event=obs_strength_clamped module=engine status=warn raw={raw} clamped={clamped}"
        );
    }
    clamped
}
