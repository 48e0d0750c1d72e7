// ============================================================
// Layer 3 — Fold Domain Type
// ============================================================
// One cross-validation partition: positions used for training
// and positions held out for out-of-sample prediction.
// The two sets are disjoint; across all folds of one partition
// the held-out sets cover every position exactly once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Fold number in 0..k
    pub number: usize,

    /// Training positions, ascending
    pub train: Vec<usize>,

    /// Held-out positions, ascending
    pub held_out: Vec<usize>,
}

impl Fold {
    pub fn holdout_len(&self) -> usize {
        self.held_out.len()
    }
}
