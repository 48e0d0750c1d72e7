// ============================================================
// Label-Error Ranker
// ============================================================
// Scores each example from its given label and its out-of-sample
// probability row. Lower score = more likely mislabelled.
//
//   NormalizedMargin : (p[label] − max_{j≠label} p[j] + 1) / 2
//   SelfConfidence   : p[label]
//
// Every example is ranked (not just the ones flagged as issues),
// so the result is a permutation of 0..N. Equal scores keep
// their original order.

use anyhow::Result;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::domain::{example::Example, PipelineError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    #[default]
    NormalizedMargin,
    SelfConfidence,
}

impl RankingCriterion {
    /// Score in [0, 1] for one row given its label.
    pub fn score(self, row: ArrayView1<'_, f32>, label: usize) -> f32 {
        let own = row[label];
        match self {
            Self::SelfConfidence => own,
            Self::NormalizedMargin => {
                let best_other = row
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != label)
                    .map(|(_, &p)| p)
                    .fold(f32::NEG_INFINITY, f32::max);
                // Single-column input has no competitor
                let best_other = if best_other.is_finite() { best_other } else { 0.0 };
                (own - best_other + 1.0) / 2.0
            }
        }
    }
}

/// Per-example quality scores in dataset order.
///
/// # Errors
/// `ShapeMismatch` when row and label counts differ,
/// `LabelOutOfRange` when a label has no matching column.
pub fn label_quality_scores(
    labels:    &[usize],
    probs:     ArrayView2<'_, f32>,
    criterion: RankingCriterion,
) -> Result<Vec<f32>, PipelineError> {
    let (rows, classes) = probs.dim();
    if rows != labels.len() {
        return Err(PipelineError::ShapeMismatch { rows, labels: labels.len() });
    }
    if let Some((position, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= classes) {
        return Err(PipelineError::LabelOutOfRange { position, label, classes });
    }

    Ok(labels
        .iter()
        .zip(probs.rows())
        .map(|(&label, row)| criterion.score(row, label))
        .collect())
}

/// Example positions ordered most-suspicious first.
pub fn rank_label_issues(
    labels:    &[usize],
    probs:     ArrayView2<'_, f32>,
    criterion: RankingCriterion,
) -> Result<Vec<usize>, PipelineError> {
    let scores = label_quality_scores(labels, probs, criterion)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

    tracing::debug!(
        "Ranked {} examples by {:?}; lowest score {:?}",
        order.len(),
        criterion,
        order.first().map(|&i| scores[i]),
    );
    Ok(order)
}

/// Map ranked positions to example identifiers.
pub fn identifiers_for(examples: &[Example], ranked: &[usize]) -> Vec<String> {
    ranked
        .iter()
        .filter_map(|&pos| examples.get(pos).map(|e| e.id.clone()))
        .collect()
}
