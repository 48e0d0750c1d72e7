// ============================================================
// Layer 6 — Probability Artifact Store
// ============================================================
// Reads and writes the .npy probability matrices through the
// paths from ArtifactPaths:
//
//   model_fold_<k>__probs.npy   [held_out_len, num_classes]
//   model_fold_<k>__probs.json  FoldArtifactMeta sidecar
//   train_model_intel_pyx.npy   [N, num_classes]
//
// Matrices are written as f32. Reading also accepts f64 arrays
// (numpy's default dtype) and narrows them.
//
// The sidecar records the fold fingerprint. A fold file whose
// fingerprint does not match the current partition was produced
// by a different (labels, k, seed, algorithm) and is rejected.

use anyhow::{Context, Result};
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::{fold::Fold, PipelineError};
use crate::infra::paths::ArtifactPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldArtifactMeta {
    pub fold:        usize,
    pub num_folds:   usize,
    pub seed:        u64,
    pub rows:        usize,
    pub classes:     usize,
    pub fingerprint: String,
}

pub struct FoldArtifactStore<'a> {
    paths: &'a ArtifactPaths,
}

impl<'a> FoldArtifactStore<'a> {
    pub fn new(paths: &'a ArtifactPaths) -> Self {
        Self { paths }
    }

    /// Persist one fold's held-out probabilities and its sidecar.
    pub fn write_fold(&self, meta: &FoldArtifactMeta, probs: &Array2<f32>) -> Result<PathBuf> {
        let path = self.paths.resolve_fold_probs(meta.fold)?;
        write_npy(&path, probs)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        let meta_path = self.paths.fold_meta_path(meta.fold);
        fs::write(&meta_path, serde_json::to_string_pretty(meta)?)
            .with_context(|| format!("Cannot write '{}'", meta_path.display()))?;

        tracing::debug!("Saved fold {} probabilities {:?} to '{}'", meta.fold, probs.dim(), path.display());
        Ok(path)
    }

    /// Load and validate one fold's probabilities.
    ///
    /// Fails with `MissingOrMalformedFoldArtifact` naming the fold when
    /// the file is absent or unreadable, the sidecar fingerprint does
    /// not match, the row count differs from the held-out size, or it
    /// has fewer than `num_classes` columns. Extra columns are dropped.
    pub fn load_fold(
        &self,
        fold:        &Fold,
        fingerprint: &str,
        num_classes: usize,
    ) -> Result<Array2<f32>, PipelineError> {
        let path = self.paths.fold_probs_path(fold.number);
        let malformed = |reason: String| PipelineError::MissingOrMalformedFoldArtifact {
            fold: fold.number,
            path: path.clone(),
            reason,
        };

        if !path.is_file() {
            return Err(malformed("file not found".into()));
        }

        let meta = self
            .read_meta(fold.number)
            .map_err(|e| malformed(format!("cannot read fingerprint sidecar: {e:#}")))?;
        if meta.fingerprint != fingerprint {
            return Err(malformed(
                "fingerprint mismatch: the artifact was produced by a different fold partition".into(),
            ));
        }

        let probs = read_matrix(&path).map_err(|e| malformed(format!("{e:#}")))?;
        let (rows, cols) = probs.dim();
        if rows != fold.holdout_len() {
            return Err(malformed(format!(
                "expected {} rows (held-out size), found {rows}",
                fold.holdout_len()
            )));
        }
        if cols < num_classes {
            return Err(malformed(format!("expected {num_classes} columns, found {cols}")));
        }

        Ok(probs.slice(ndarray::s![.., ..num_classes]).to_owned())
    }

    /// True when the fold's file and sidecar exist and match `fingerprint`.
    pub fn is_cached(&self, fold: &Fold, fingerprint: &str, num_classes: usize) -> bool {
        self.load_fold(fold, fingerprint, num_classes).is_ok()
    }

    pub fn write_final(&self, pyx: &Array2<f32>) -> Result<PathBuf> {
        let path = self.paths.resolve_final_probs()?;
        write_npy(&path, pyx)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }

    pub fn read_final(&self) -> Result<Array2<f32>> {
        read_matrix(&self.paths.final_probs_path())
    }

    fn read_meta(&self, fold: usize) -> Result<FoldArtifactMeta> {
        let path = self.paths.fold_meta_path(fold);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Read a 2-D .npy matrix stored as f32 or f64.
pub fn read_matrix(path: &Path) -> Result<Array2<f32>> {
    match read_npy::<_, Array2<f32>>(path) {
        Ok(m) => Ok(m),
        Err(f32_err) => {
            let wide: Array2<f64> = read_npy(path).map_err(|_| {
                anyhow::anyhow!("Cannot read '{}' as a 2-D float matrix: {}", path.display(), f32_err)
            })?;
            Ok(wide.mapv(|v| v as f32))
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::paths::JobIdentity;
    use ndarray::array;

    fn setup() -> (tempfile::TempDir, ArtifactPaths) {
        let dir   = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path(), JobIdentity::new("p", "j", "r"));
        (dir, paths)
    }

    fn fold(number: usize, held_out: Vec<usize>) -> Fold {
        Fold { number, train: vec![], held_out }
    }

    fn meta(fold: usize, rows: usize, fingerprint: &str) -> FoldArtifactMeta {
        FoldArtifactMeta {
            fold,
            num_folds: 2,
            seed: 42,
            rows,
            classes: 2,
            fingerprint: fingerprint.into(),
        }
    }

    #[test]
    fn test_fold_written_then_loaded() {
        let (_dir, paths) = setup();
        let store = FoldArtifactStore::new(&paths);
        let probs = array![[0.9f32, 0.1], [0.2, 0.8]];
        store.write_fold(&meta(0, 2, "abc"), &probs).unwrap();

        let loaded = store.load_fold(&fold(0, vec![1, 3]), "abc", 2).unwrap();
        assert_eq!(loaded, probs);
        assert!(store.is_cached(&fold(0, vec![1, 3]), "abc", 2));
    }

    #[test]
    fn test_missing_file_names_fold() {
        let (_dir, paths) = setup();
        let store = FoldArtifactStore::new(&paths);
        let err   = store.load_fold(&fold(4, vec![0]), "abc", 2).unwrap_err();
        assert_eq!(err.fold(), Some(4));
    }

    #[test]
    fn test_wrong_row_count_rejected() {
        let (_dir, paths) = setup();
        let store = FoldArtifactStore::new(&paths);
        store.write_fold(&meta(1, 1, "abc"), &array![[0.5f32, 0.5]]).unwrap();

        match store.load_fold(&fold(1, vec![0, 2]), "abc", 2) {
            Err(PipelineError::MissingOrMalformedFoldArtifact { fold, reason, .. }) => {
                assert_eq!(fold, 1);
                assert!(reason.contains("expected 2 rows"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fingerprint_mismatch_rejected() {
        let (_dir, paths) = setup();
        let store = FoldArtifactStore::new(&paths);
        store.write_fold(&meta(0, 1, "old"), &array![[0.5f32, 0.5]]).unwrap();
        let err = store.load_fold(&fold(0, vec![0]), "new", 2).unwrap_err();
        assert!(err.to_string().contains("fingerprint mismatch"));
        assert!(!store.is_cached(&fold(0, vec![0]), "new", 2));
    }

    #[test]
    fn test_extra_columns_truncated_and_f64_accepted() {
        let (_dir, paths) = setup();
        let store = FoldArtifactStore::new(&paths);
        store.write_fold(&meta(0, 1, "abc"), &array![[0.5f32, 0.5]]).unwrap();
        // Overwrite the matrix with a wider f64 array, as numpy would save it
        write_npy(paths.fold_probs_path(0), &array![[0.25f64, 0.5, 0.25]]).unwrap();

        let loaded = store.load_fold(&fold(0, vec![0]), "abc", 2).unwrap();
        assert_eq!(loaded, array![[0.25f32, 0.5]]);
    }
}
