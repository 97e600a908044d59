//! Feature-vector primitives: similarity and fingerprint decay.
//!
//! # Responsibility
//! - Compare an observation vector against an interval fingerprint.
//! - Fold new observations into the running fingerprint.
//!
//! # Invariants
//! - Both functions are pure; fingerprints are replaced, never edited in place.
//! - A zero-norm vector compares as 0.0 similarity, never as an error.

use std::collections::BTreeMap;

/// Sparse named feature vector, keyed by signal name.
///
/// `BTreeMap` keeps iteration order deterministic for exports and tests.
pub type SignalVector = BTreeMap<String, f64>;

/// Cosine similarity between two sparse vectors over the union of their keys.
///
/// Keys absent from one side contribute 0. Returns 0.0 when either vector has
/// zero norm: an undefined direction carries no similarity.
pub fn cosine_similarity(a: &SignalVector, b: &SignalVector) -> f64 {
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Union dot product: terms with a key missing on either side are zero,
    // so iterating the intersection is sufficient.
    let dot: f64 = a
        .iter()
        .filter_map(|(key, value_a)| b.get(key).map(|value_b| value_a * value_b))
        .sum();

    dot / (norm_a * norm_b)
}

/// Exponential moving average of `incoming` into `old`, per key.
///
/// `new[k] = alpha * old.get(k, 0) + (1 - alpha) * incoming[k]` for every key
/// of `incoming`; keys only present in `old` are carried over unchanged. An
/// `alpha` close to 1 biases toward stability (slow fingerprint drift).
pub fn update_fingerprint(old: &SignalVector, incoming: &SignalVector, alpha: f64) -> SignalVector {
    let mut updated = old.clone();
    for (key, value) in incoming {
        let prior = updated.get(key).copied().unwrap_or(0.0);
        updated.insert(key.clone(), alpha * prior + (1.0 - alpha) * value);
    }
    updated
}

fn norm(vector: &SignalVector) -> f64 {
    vector.values().map(|value| value * value).sum::<f64>().sqrt()
}
