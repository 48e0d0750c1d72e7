// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline driver only talks to these traits. The burn
// implementations live in Layer 5 (ml) and the image-folder
// loader in Layer 4 (data); tests plug in in-memory fakes.
//
//   DatasetProvider → ordered examples + class names
//   Trainer         → train(epochs, model, classes, split) → (model, loss)
//   Predictor       → predict(model, examples) → N×C probabilities

use anyhow::Result;
use ndarray::Array2;
use std::path::Path;

use crate::domain::example::{Example, LabeledDataset};

// ─── DatasetProvider ──────────────────────────────────────────────────────────
/// Any component that can enumerate a labelled dataset.
///
/// Must return examples in the same order on every call against the
/// same source; fold membership is recomputed from that order.
pub trait DatasetProvider {
    fn load(&self) -> Result<LabeledDataset>;
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
/// Training and validation examples for one training run.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train:      Vec<Example>,
    pub validation: Vec<Example>,
}

/// Everything a trainer needs for one run.
#[derive(Debug, Clone, Copy)]
pub struct TrainJob<'a> {
    pub epochs:      usize,
    pub model_name:  &'a str,
    pub class_names: &'a [String],
    pub split:       &'a DatasetSplit,
}

/// A trained model handle plus its final validation loss.
#[derive(Debug)]
pub struct TrainedModel<M> {
    pub model: M,
    pub loss:  f64,
}

pub trait Trainer {
    /// Opaque model handle produced by training.
    type Model;

    fn train(&self, job: &TrainJob<'_>) -> Result<TrainedModel<Self::Model>>;

    /// Write the model to `path` so a `Predictor` can load it later.
    fn persist(&self, model: &Self::Model, path: &Path) -> Result<()>;
}

// ─── Predictor ────────────────────────────────────────────────────────────────
pub trait Predictor {
    type Model;

    fn load(&self, path: &Path) -> Result<Self::Model>;

    /// Class probabilities, one row per example in the order given.
    fn predict(&self, model: &Self::Model, examples: &[Example]) -> Result<Array2<f32>>;
}
