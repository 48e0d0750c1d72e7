// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Typed failure conditions raised by the label-error pipeline.
// The application layer works in anyhow::Result, so these
// travel inside anyhow::Error and can be recovered with
// `err.downcast_ref::<PipelineError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Zero, or more than one, of {only_train, only_predict, cv_folds > 0} was set.
    #[error("exactly one of only_train, only_predict or cv_folds > 0 must be selected ({selected} selected)")]
    AmbiguousModeSelection { selected: usize },

    #[error("at least 2 distinct classes are required, found {found}")]
    InsufficientClasses { found: usize },

    #[error("fold count {folds} is outside the valid range [2, {examples}]")]
    InvalidFoldCount { folds: usize, examples: usize },

    /// Names the fold so the operator can re-run just that fold.
    #[error("fold {fold} artifact '{}' is missing or malformed: {reason}", path.display())]
    MissingOrMalformedFoldArtifact {
        fold:   usize,
        path:   PathBuf,
        reason: String,
    },

    #[error("external training failed ({stage}): {message}")]
    ExternalTrainingFailure { stage: String, message: String },

    #[error("probability matrix has {rows} rows but {labels} labels were given")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("example {position} has label {label} but the probability matrix only has {classes} columns")]
    LabelOutOfRange {
        position: usize,
        label:    usize,
        classes:  usize,
    },
}

impl PipelineError {
    /// Wrap an adapter error as a training failure for the given stage.
    pub fn training_failure(stage: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::ExternalTrainingFailure {
            stage:   stage.into(),
            message: format!("{err:#}"),
        }
    }

    /// The fold named by this error, if any.
    pub fn fold(&self) -> Option<usize> {
        match self {
            Self::MissingOrMalformedFoldArtifact { fold, .. } => Some(*fold),
            _ => None,
        }
    }
}
