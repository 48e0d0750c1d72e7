// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores a trained classifier using Burn's
// CompactRecorder.
//
// What gets saved for a model at <model_path>:
//   1. <model_path>.mpk          — all learned parameters
//                                   (the recorder adds the extension)
//   2. <model_path>.config.json  — ImageClassifierConfig, needed to
//                                   rebuild the architecture before
//                                   loading the weights into it
//
// CompactRecorder:
//   - Serialises model parameters to MessagePack (half precision)
//   - Type-safe: loading fails if architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::CompactRecorder,
};
use std::{
    fs,
    path::PathBuf,
};

use crate::infra::paths::with_suffix;
use crate::ml::model::{ClassifierHandle, ImageClassifierConfig};

/// Manages one model artifact and its architecture config.
pub struct CheckpointManager {
    /// Model path without the recorder's extension
    model_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self { model_path: model_path.into() }
    }

    pub fn config_path(&self) -> PathBuf {
        with_suffix(&self.model_path, ".config.json")
    }

    /// Save weights and architecture config.
    pub fn save_model<B: Backend>(&self, handle: &ClassifierHandle<B>) -> Result<()> {
        if let Some(parent) = self.model_path.parent() {
            fs::create_dir_all(parent)?;
        }

        handle
            .model
            .clone()
            .save_file(self.model_path.clone(), &CompactRecorder::new())
            .with_context(|| {
                format!("Failed to save model to '{}'", self.model_path.display())
            })?;

        self.save_config(&handle.config)?;

        tracing::info!("Saved model to '{}'", self.model_path.display());
        Ok(())
    }

    /// Rebuild the architecture from its config, then load the weights.
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> Result<ClassifierHandle<B>> {
        let config = self.load_config()?;
        let model  = config
            .init::<B>(device)
            .load_file(self.model_path.clone(), &CompactRecorder::new(), device)
            .with_context(|| {
                format!(
                    "Cannot load model '{}'. Have you run with --only-train first?",
                    self.model_path.display()
                )
            })?;

        tracing::info!("Loaded model from '{}'", self.model_path.display());
        Ok(ClassifierHandle { model, config })
    }

    pub fn save_config(&self, cfg: &ImageClassifierConfig) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<ImageClassifierConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read model config from '{}'. Make sure the model was trained first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
