// ============================================================
// Fold Aggregator
// ============================================================
// Reads every fold's held-out probabilities and scatters their
// rows back to the original example positions:
//
//   fold 0 held_out [1, 4] ─┐
//   fold 1 held_out [0, 3] ─┼─▶ pyx[N, C], row i = prediction
//   fold 2 held_out [2]    ─┘    from the fold that held i out
//
// Every fold is loaded and validated before anything is written,
// so a missing fold never leaves a partially-filled matrix on
// disk.

use anyhow::Result;
use ndarray::{Array2, ArrayView2};
use std::path::PathBuf;

use crate::domain::{fold::Fold, PipelineError};
use crate::infra::{artifacts::FoldArtifactStore, paths::ArtifactPaths};

/// Assemble the full probability matrix and write it to
/// `train_model_intel_pyx.npy` (overwriting). Returns its path.
///
/// # Errors
/// `MissingOrMalformedFoldArtifact` naming the first bad fold.
pub fn combine_folds(
    labels:      &[usize],
    folds:       &[Fold],
    paths:       &ArtifactPaths,
    num_classes: usize,
    fingerprint: &str,
) -> Result<PathBuf> {
    let store = FoldArtifactStore::new(paths);

    // ── Load and validate all folds first ─────────────────────────────────────
    let mut loaded = Vec::with_capacity(folds.len());
    for fold in folds {
        loaded.push(store.load_fold(fold, fingerprint, num_classes)?);
    }

    // ── Scatter rows ──────────────────────────────────────────────────────────
    let mut pyx     = Array2::<f32>::zeros((labels.len(), num_classes));
    let mut covered = vec![false; labels.len()];
    for (fold, probs) in folds.iter().zip(&loaded) {
        for (row, &position) in fold.held_out.iter().enumerate() {
            pyx.row_mut(position).assign(&probs.row(row));
            covered[position] = true;
        }
    }

    if let Some(gap) = covered.iter().position(|c| !c) {
        anyhow::bail!("fold partition does not cover example {gap}");
    }

    let path = store.write_final(&pyx)?;
    tracing::info!(
        "Combined {} folds into {:?} at '{}' (held-out top-1 accuracy {:.3})",
        folds.len(),
        pyx.dim(),
        path.display(),
        top1_accuracy(pyx.view(), labels),
    );
    Ok(path)
}

/// Fraction of rows whose argmax equals the label.
pub fn top1_accuracy(probs: ArrayView2<'_, f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = probs
        .rows()
        .into_iter()
        .zip(labels)
        .filter(|(row, label)| argmax(row.iter().copied()) == Some(**label))
        .count();
    hits as f64 / labels.len() as f64
}

fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
