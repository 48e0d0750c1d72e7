// ============================================================
// Layer 6 — Artifact Path Resolver
// ============================================================
// The only place that knows where artifacts live on disk:
//
//   <root>/<project_id>/<job_name>/<model_repository>/
//     data/                              ← imported dataset
//     model/<framework>/<timestamp>/     ← detection runs
//     pytorch/model/
//       model_fold_<k>__probs.npy        ← held-out probabilities of fold k
//       model_fold_<k>__probs.json       ← fingerprint of fold k's partition
//       train_model_intel_pyx.npy        ← assembled N×C matrix
//       fold_metrics.csv
//       pipeline_request.json
//       <model_name>.mpk                 ← train-only model
//
// Two kinds of methods:
//   *_dir / *_path  — pure path computation, touch nothing
//   ensure_dir / resolve_*  — also create missing directories
//                     (create_dir_all: idempotent, never deletes)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const FINAL_PROBS_FILE: &str    = "train_model_intel_pyx.npy";
pub const FOLD_METRICS_FILE: &str   = "fold_metrics.csv";
pub const REQUEST_FILE: &str        = "pipeline_request.json";

/// Identity triple that scopes every artifact of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub project_id:       String,
    pub job_name:         String,
    pub model_repository: String,
}

impl JobIdentity {
    pub fn new(
        project_id:       impl Into<String>,
        job_name:         impl Into<String>,
        model_repository: impl Into<String>,
    ) -> Self {
        Self {
            project_id:       project_id.into(),
            job_name:         job_name.into(),
            model_repository: model_repository.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
    job:  JobIdentity,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>, job: JobIdentity) -> Self {
        Self { root: root.into(), job }
    }

    // ── Pure path computation ────────────────────────────────────────────────

    pub fn job_dir(&self) -> PathBuf {
        self.root.join(&self.job.project_id).join(&self.job.job_name)
    }

    pub fn model_repository_dir(&self) -> PathBuf {
        self.job_dir().join(&self.job.model_repository)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.model_repository_dir().join("data")
    }

    /// Directory for one detection-framework training run.
    pub fn framework_run_dir(&self, model_framework: &str, timestamp: &str) -> PathBuf {
        self.model_repository_dir()
            .join("model")
            .join(model_framework)
            .join(timestamp)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.model_repository_dir().join("pytorch").join("model")
    }

    pub fn fold_probs_path(&self, fold: usize) -> PathBuf {
        self.model_dir().join(format!("model_fold_{fold}__probs.npy"))
    }

    pub fn fold_meta_path(&self, fold: usize) -> PathBuf {
        self.model_dir().join(format!("model_fold_{fold}__probs.json"))
    }

    pub fn final_probs_path(&self) -> PathBuf {
        self.model_dir().join(FINAL_PROBS_FILE)
    }

    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir().join(model_name)
    }

    pub fn fold_metrics_path(&self) -> PathBuf {
        self.model_dir().join(FOLD_METRICS_FILE)
    }

    pub fn request_path(&self) -> PathBuf {
        self.model_dir().join(REQUEST_FILE)
    }

    // ── Side-effecting resolution ─────────────────────────────────────────────

    /// Create `dir` and its parents if missing; returns it unchanged.
    pub fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        Ok(dir)
    }

    /// Create the parent directory of a file path.
    pub fn ensure_parent(path: PathBuf) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent.to_path_buf())?;
        }
        Ok(path)
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        Self::ensure_dir(self.data_dir())
    }

    pub fn resolve_framework_run_dir(&self, model_framework: &str, timestamp: &str) -> Result<PathBuf> {
        Self::ensure_dir(self.framework_run_dir(model_framework, timestamp))
    }

    pub fn resolve_fold_probs(&self, fold: usize) -> Result<PathBuf> {
        Self::ensure_parent(self.fold_probs_path(fold))
    }

    pub fn resolve_final_probs(&self) -> Result<PathBuf> {
        Self::ensure_parent(self.final_probs_path())
    }

    pub fn resolve_model_path(&self, model_name: &str) -> Result<PathBuf> {
        Self::ensure_parent(self.model_path(model_name))
    }
}

/// `<path><suffix>` without touching the existing extension,
/// e.g. `model.v2` + `.config.json` → `model.v2.config.json`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
