use chrono::{DateTime, Duration, TimeZone, Utc};
use continuum_core::scoring::{compute_confidence, compute_severity};
use continuum_core::{
    AbsenceAtom, AtomValidationError, ClosureReason, ConfigError, ContinuumConfig,
    ContinuumEngine, EngineError, FixedClock, GapLevel, IngestAction, SequenceIdGenerator,
    SignalVector,
};

const ENTITY: &str = "model-123";
const SIGNAL: &str = "absence:evidence.training.disclosure";

fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::days(offset)
}

fn vector(entries: &[(&str, f64)]) -> SignalVector {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_string(), *value))
        .collect()
}

fn base_vector() -> SignalVector {
    vector(&[("f1", 0.9), ("f2", 0.2), ("f3", 0.7)])
}

fn shifted_vector() -> SignalVector {
    vector(&[("f1", 0.9), ("f2", 0.2), ("f3", 0.1), ("f4", 0.5)])
}

fn drifted_vector() -> SignalVector {
    vector(&[("f1", 0.9), ("f2", 0.2), ("f4", 0.1), ("f5", 0.5)])
}

fn absence(ts: DateTime<Utc>, signal_vector: SignalVector, evidence: &str) -> AbsenceAtom {
    AbsenceAtom::new(
        ts,
        ENTITY,
        SIGNAL,
        0.9,
        signal_vector,
        vec![evidence.to_string()],
    )
}

fn engine_on(clock: &FixedClock) -> ContinuumEngine<&FixedClock, SequenceIdGenerator> {
    ContinuumEngine::try_with_runtime(
        ContinuumConfig::default(),
        clock,
        SequenceIdGenerator::new(),
    )
    .unwrap()
}

#[test]
fn first_absence_opens_an_interval() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let outcome = engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();
    assert_eq!(outcome.action, IngestAction::Opened { displaced: None });

    let interval = engine.interval(outcome.interval_id).unwrap();
    assert!(interval.is_open());
    assert_eq!(interval.entity_id, ENTITY);
    assert_eq!(interval.gap_id, SIGNAL);
    assert_eq!(interval.persistence_days, 1);
    assert_eq!(interval.observations, 1);
    assert_eq!(interval.parent_interval, None);
    assert!(interval.lineage.is_empty());
    assert_eq!(interval.fingerprint, base_vector());

    // Scores come straight from the scoring formulas with the signal's
    // configured weight of 3.0.
    assert_eq!(interval.severity, compute_severity(1, 1, 3.0));
    assert_eq!(interval.confidence, compute_confidence(0.9, 1));
    assert_eq!(interval.level, GapLevel::Structural);
}

#[test]
fn similar_atoms_continue_one_interval_over_seven_days() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let first = engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();
    for (offset, evidence) in [(3, "scan-1"), (6, "scan-2")] {
        clock.set(day(offset));
        let outcome = engine
            .ingest_absence(&absence(day(offset), base_vector(), evidence))
            .unwrap();
        assert_eq!(outcome.action, IngestAction::Continued);
        assert_eq!(outcome.interval_id, first.interval_id);
    }

    assert_eq!(engine.intervals().count(), 1);
    let interval = engine.interval(first.interval_id).unwrap();
    assert!(interval.is_open());
    assert_eq!(interval.observations, 3);
    assert_eq!(interval.persistence_days, 7);
    assert_eq!(
        interval.evidence_refs,
        vec!["scan-0".to_string(), "scan-1".to_string(), "scan-2".to_string()]
    );
    // Identical incoming vectors keep the EMA fingerprint on the same
    // values, up to float rounding in the blend.
    assert_eq!(interval.fingerprint.len(), base_vector().len());
    for (feature, expected) in base_vector() {
        let blended = interval.fingerprint[&feature];
        assert!(
            (blended - expected).abs() < 1e-12,
            "{feature}: expected ~{expected}, got {blended}"
        );
    }

    assert_eq!(interval.severity, compute_severity(7, 3, 3.0));
    assert_eq!(interval.level, GapLevel::Systemic);
    assert_eq!(interval.obs_strength_avg, 0.9);
    assert_eq!(interval.confidence, compute_confidence(0.9, 3));
    assert!(interval.confidence > 0.79 && interval.confidence < 0.81);
}

#[test]
fn shifted_vector_mutates_and_links_lineage() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let parent = engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();
    for (offset, evidence) in [(3, "scan-1"), (6, "scan-2")] {
        clock.set(day(offset));
        engine
            .ingest_absence(&absence(day(offset), base_vector(), evidence))
            .unwrap();
    }

    clock.set(day(9));
    let outcome = engine
        .ingest_absence(&absence(day(9), shifted_vector(), "scan-3"))
        .unwrap();
    assert_eq!(
        outcome.action,
        IngestAction::Mutated {
            closed_parent: parent.interval_id
        }
    );
    assert_ne!(outcome.interval_id, parent.interval_id);

    let closed = engine.interval(parent.interval_id).unwrap();
    assert!(!closed.is_open());
    assert_eq!(closed.end, Some(day(9) - Duration::seconds(1)));
    assert_eq!(closed.closure_reason, Some(ClosureReason::ClosureByMutation));
    assert_eq!(closed.persistence_days, 9);
    assert_eq!(closed.observations, 3);

    let child = engine.interval(outcome.interval_id).unwrap();
    assert!(child.is_open());
    assert_eq!(child.parent_interval, Some(parent.interval_id));
    assert_eq!(child.lineage, vec![parent.interval_id]);
    assert_eq!(child.observations, 1);
    assert_eq!(child.fingerprint, shifted_vector());
    assert_eq!(child.mutation_count_total, 1);
    assert_eq!(child.mutations_in_window, 1);
    assert_eq!(child.mutation_density, 1.0 / 30.0);

    let events = engine.mutation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ts, day(9));
    assert_eq!(events[0].parent_interval_id, parent.interval_id);
    assert_eq!(events[0].child_interval_id, outcome.interval_id);

    // The open slot for the key now belongs to the child.
    assert_eq!(
        engine.open_interval(ENTITY, SIGNAL).unwrap().id,
        outcome.interval_id
    );

    // A repeat of the shifted vector matches the child's fingerprint
    // exactly and continues it.
    clock.set(day(12));
    let repeat = engine
        .ingest_absence(&absence(day(12), shifted_vector(), "scan-4"))
        .unwrap();
    assert_eq!(repeat.action, IngestAction::Continued);
    assert_eq!(repeat.interval_id, outcome.interval_id);
    assert_eq!(engine.mutation_events().len(), 1);
}

#[test]
fn chained_mutations_accumulate_lineage_in_order() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let first = engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();

    clock.set(day(3));
    let second = engine
        .ingest_absence(&absence(day(3), shifted_vector(), "scan-1"))
        .unwrap();
    assert_eq!(
        second.action,
        IngestAction::Mutated {
            closed_parent: first.interval_id
        }
    );

    // The drifted vector still sits in the mutation band against the
    // child's fingerprint, so a second transition chains off it.
    clock.set(day(6));
    let third = engine
        .ingest_absence(&absence(day(6), drifted_vector(), "scan-2"))
        .unwrap();
    assert_eq!(
        third.action,
        IngestAction::Mutated {
            closed_parent: second.interval_id
        }
    );

    let grandchild = engine.interval(third.interval_id).unwrap();
    assert_eq!(grandchild.parent_interval, Some(second.interval_id));
    assert_eq!(
        grandchild.lineage,
        vec![first.interval_id, second.interval_id]
    );
    assert_eq!(grandchild.mutation_count_total, 2);
    assert_eq!(grandchild.mutations_in_window, 2);
    assert_eq!(grandchild.mutation_density, 2.0 / 30.0);

    // The middle link keeps its own one-step lineage after closure.
    let middle = engine.interval(second.interval_id).unwrap();
    assert!(!middle.is_open());
    assert_eq!(middle.end, Some(day(6) - Duration::seconds(1)));
    assert_eq!(middle.lineage, vec![first.interval_id]);
    assert_eq!(middle.mutation_count_total, 1);
    assert_eq!(middle.mutations_in_window, 1);

    let events = engine.mutation_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].parent_interval_id, first.interval_id);
    assert_eq!(events[0].child_interval_id, second.interval_id);
    assert_eq!(events[1].parent_interval_id, second.interval_id);
    assert_eq!(events[1].child_interval_id, third.interval_id);
}

#[test]
fn unrelated_vector_displaces_without_lineage() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let stale = engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();

    clock.set(day(3));
    let outcome = engine
        .ingest_absence(&absence(day(3), vector(&[("g1", 1.0)]), "scan-1"))
        .unwrap();
    assert_eq!(
        outcome.action,
        IngestAction::Opened {
            displaced: Some(stale.interval_id)
        }
    );

    let closed = engine.interval(stale.interval_id).unwrap();
    assert!(!closed.is_open());
    assert_eq!(closed.end, Some(day(3) - Duration::seconds(1)));
    assert_eq!(closed.closure_reason, Some(ClosureReason::ClosureByMutation));

    let fresh = engine.interval(outcome.interval_id).unwrap();
    assert!(fresh.is_open());
    assert_eq!(fresh.parent_interval, None);
    assert!(fresh.lineage.is_empty());
    assert_eq!(fresh.mutation_count_total, 0);

    // Displacement records no mutation event: below tau_mut the streams
    // are treated as unrelated.
    assert!(engine.mutation_events().is_empty());
    assert_eq!(
        engine.open_interval(ENTITY, SIGNAL).unwrap().id,
        outcome.interval_id
    );
}

#[test]
fn keys_are_tracked_independently() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    engine
        .ingest_absence(&absence(day(0), base_vector(), "scan-0"))
        .unwrap();
    engine
        .ingest_absence(&AbsenceAtom::new(
            day(0),
            "model-456",
            SIGNAL,
            0.8,
            base_vector(),
            vec!["scan-b".to_string()],
        ))
        .unwrap();
    engine
        .ingest_absence(&AbsenceAtom::new(
            day(0),
            ENTITY,
            "absence:license.traceability",
            0.8,
            base_vector(),
            vec!["scan-c".to_string()],
        ))
        .unwrap();

    assert_eq!(engine.intervals().count(), 3);
    assert!(engine.open_interval(ENTITY, SIGNAL).is_some());
    assert!(engine.open_interval("model-456", SIGNAL).is_some());
    assert!(engine
        .open_interval(ENTITY, "absence:license.traceability")
        .is_some());
}

#[test]
fn out_of_range_strength_is_clamped_into_scores() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let outcome = engine
        .ingest_absence(&AbsenceAtom::new(
            day(0),
            ENTITY,
            SIGNAL,
            1.7,
            base_vector(),
            vec!["scan-0".to_string()],
        ))
        .unwrap();

    let interval = engine.interval(outcome.interval_id).unwrap();
    assert_eq!(interval.obs_strength_sum, 1.0);
    assert_eq!(interval.obs_strength_avg, 1.0);
}

#[test]
fn invalid_atom_is_rejected_before_any_state_change() {
    let clock = FixedClock::new(day(0));
    let mut engine = engine_on(&clock);

    let err = engine
        .ingest_absence(&AbsenceAtom::new(
            day(0),
            "   ",
            SIGNAL,
            0.9,
            base_vector(),
            Vec::new(),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Atom(AtomValidationError::MissingEntityId)
    ));
    assert_eq!(engine.intervals().count(), 0);
    assert!(engine.mutation_events().is_empty());
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let clock = FixedClock::new(day(0));
    let config = ContinuumConfig {
        tau_in: 0.5,
        tau_mut: 0.7,
        ..ContinuumConfig::default()
    };
    let err = ContinuumEngine::try_with_runtime(config, &clock, SequenceIdGenerator::new())
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn huge_mutation_window_is_rejected_at_construction() {
    // Unbounded, the window subtraction would overflow the datetime range
    // on the first ingest; construction must refuse it up front.
    let clock = FixedClock::new(day(0));
    let config = ContinuumConfig {
        mutation_window_days: u32::MAX,
        ..ContinuumConfig::default()
    };
    let err = ContinuumEngine::try_with_runtime(config, &clock, SequenceIdGenerator::new())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        EngineError::Config(ConfigError::MutationWindowOutOfRange { value: u32::MAX })
    ));
}
