// ============================================================
// Layer 4 — Dataset Splitters
// ============================================================
// Two seeded, reproducible splitters:
//
//   stratified_k_fold  — k held-out folds preserving class
//                        proportions (cross-validation mode)
//   split_train_val    — one shuffled train/validation split
//                        (train-only mode)
//
// Both use ChaCha8Rng seeded from the caller's seed, so the same
// inputs always give the same split. Per-fold probability files
// cached on disk are only meaningful under that guarantee: the
// aggregator recomputes fold membership instead of reading it
// back. `fold_fingerprint` hashes everything that determines the
// partition, including PARTITIONER_VERSION, and is stored next to
// each per-fold artifact.
//
// Stratified k-fold algorithm:
//   1. Group positions by label, labels ascending
//   2. Shuffle each group with the shared seeded RNG
//   3. Deal positions round-robin to folds; the fold cursor
//      carries over from one class to the next
//   4. Sort each fold's held-out positions
//
// Step 3 gives every fold floor(n_c/k) or ceil(n_c/k) examples of
// class c, and fold sizes differ by at most one overall.

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::{fold::Fold, PipelineError};

/// Bump when the fold assignment algorithm changes.
pub const PARTITIONER_VERSION: u32 = 1;

/// Split `labels.len()` examples into `k` stratified folds.
///
/// # Errors
/// `InvalidFoldCount` when `k < 2` or `k > labels.len()`.
pub fn stratified_k_fold(labels: &[usize], k: usize, seed: u64) -> Result<Vec<Fold>, PipelineError> {
    let n = labels.len();
    if k < 2 || k > n {
        return Err(PipelineError::InvalidFoldCount { folds: k, examples: n });
    }

    // BTreeMap keeps classes in ascending label order
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (position, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(position);
    }

    let mut rng      = ChaCha8Rng::seed_from_u64(seed);
    let mut held_out = vec![Vec::with_capacity(n / k + 1); k];
    let mut cursor   = 0usize;

    for positions in by_class.values_mut() {
        positions.shuffle(&mut rng);
        for &position in positions.iter() {
            held_out[cursor].push(position);
            cursor = (cursor + 1) % k;
        }
    }

    let folds = held_out
        .into_iter()
        .enumerate()
        .map(|(number, mut held)| {
            held.sort_unstable();
            let mut in_fold = vec![false; n];
            for &p in &held {
                in_fold[p] = true;
            }
            let train = (0..n).filter(|&p| !in_fold[p]).collect();
            Fold { number, train, held_out: held }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Stratified {}-fold split of {} examples ({} classes), held-out sizes {:?}",
        k,
        n,
        by_class.len(),
        folds.iter().map(Fold::holdout_len).collect::<Vec<_>>()
    );

    Ok(folds)
}

/// Hex SHA-256 over everything that determines fold membership.
pub fn fold_fingerprint(labels: &[usize], k: usize, seed: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(PARTITIONER_VERSION.to_le_bytes());
    hasher.update((k as u64).to_le_bytes());
    hasher.update(seed.to_le_bytes());
    hasher.update((labels.len() as u64).to_le_bytes());
    for &label in labels {
        hasher.update((label as u64).to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Shuffle `samples` with a seeded RNG and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.8 = 80%
/// * `seed`           - RNG seed; equal seeds give equal splits
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    // e.g. 100 samples * 0.8 = 80 → first 80 are training
    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], val = [split_at..total]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}
