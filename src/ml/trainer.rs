// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Burn implementation of the Trainer contract: full train +
// validation loop using Burn's DataLoader and Adam.
//
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - The validation batcher also uses B::InnerBackend
//   - The returned loss is the last epoch's validation loss
//     (training loss when the validation split is empty)
//
// All tuning knobs arrive through TrainerSettings at construction.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{batcher::ImageBatcher, dataset::ImageDataset};
use crate::domain::traits::{TrainJob, TrainedModel, Trainer};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{ClassifierHandle, ImageClassifierConfig};

pub type TrainBackend = Autodiff<Wgpu>;

/// Tuning values for the burn trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSettings {
    pub batch_size:    usize,
    pub learning_rate: f64,
    /// Images are resized to image_size × image_size (minimum 8)
    pub image_size:    usize,
    pub base_filters:  usize,
    pub dropout:       f64,
    pub num_workers:   usize,
    pub shuffle_seed:  u64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            batch_size:    16,
            learning_rate: 1e-3,
            image_size:    64,
            base_filters:  16,
            dropout:       0.2,
            num_workers:   1,
            shuffle_seed:  42,
        }
    }
}

pub struct BurnTrainer<B: AutodiffBackend> {
    settings: TrainerSettings,
    device:   B::Device,
}

impl BurnTrainer<TrainBackend> {
    pub fn wgpu(settings: TrainerSettings) -> Self {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        Self::new(settings, device)
    }
}

impl<B: AutodiffBackend> BurnTrainer<B> {
    pub fn new(settings: TrainerSettings, device: B::Device) -> Self {
        Self { settings, device }
    }

    fn model_config(&self, num_classes: usize) -> ImageClassifierConfig {
        ImageClassifierConfig::new(num_classes)
            .with_image_size(self.settings.image_size.max(8))
            .with_base_filters(self.settings.base_filters)
            .with_dropout(self.settings.dropout)
    }
}

impl<B: AutodiffBackend> Trainer for BurnTrainer<B> {
    type Model = ClassifierHandle<B::InnerBackend>;

    fn train(&self, job: &TrainJob<'_>) -> Result<TrainedModel<Self::Model>> {
        let cfg = &self.settings;
        if job.split.train.is_empty() {
            anyhow::bail!("training split is empty");
        }

        // ── Build model ───────────────────────────────────────────────────────
        let model_cfg = self.model_config(job.class_names.len());
        let mut model = model_cfg.init::<B>(&self.device);
        tracing::info!(
            "Training '{}': {} classes, {} train / {} validation images, {} epochs",
            job.model_name,
            job.class_names.len(),
            job.split.train.len(),
            job.split.validation.len(),
            job.epochs,
        );

        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_batcher = ImageBatcher::<B>::new(self.device.clone(), model_cfg.image_size);
        let train_loader  = DataLoaderBuilder::new(train_batcher)
            .batch_size(cfg.batch_size.max(1))
            .shuffle(cfg.shuffle_seed)
            .num_workers(cfg.num_workers.max(1))
            .build(ImageDataset::from_examples(&job.split.train));

        // ── Validation data loader (InnerBackend — no autodiff overhead) ──────
        let val_batcher = ImageBatcher::<B::InnerBackend>::new(self.device.clone(), model_cfg.image_size);
        let val_loader  = DataLoaderBuilder::new(val_batcher)
            .batch_size(cfg.batch_size.max(1))
            .num_workers(cfg.num_workers.max(1))
            .build(ImageDataset::from_examples(&job.split.validation));

        let mut last_loss = f64::NAN;

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=job.epochs.max(1) {
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;

            for batch in train_loader.iter() {
                let (loss, _) = model.forward_loss(batch.images, batch.targets);
                train_loss_sum += loss.clone().into_scalar().elem::<f64>();
                train_batches  += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(cfg.learning_rate, model, grads);
            }
            let avg_train_loss = train_loss_sum / train_batches.max(1) as f64;

            // ── Validation phase ──────────────────────────────────────────────
            let model_valid = model.valid();
            let mut val_loss_sum = 0.0f64;
            let mut val_batches  = 0usize;
            for batch in val_loader.iter() {
                let (loss, _) = model_valid.forward_loss(batch.images, batch.targets);
                val_loss_sum += loss.into_scalar().elem::<f64>();
                val_batches  += 1;
            }

            last_loss = if val_batches > 0 {
                val_loss_sum / val_batches as f64
            } else {
                avg_train_loss
            };

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
                epoch, job.epochs.max(1), avg_train_loss, last_loss,
            );
        }

        Ok(TrainedModel {
            model: ClassifierHandle { model: model.valid(), config: model_cfg },
            loss:  last_loss,
        })
    }

    fn persist(&self, model: &Self::Model, path: &Path) -> Result<()> {
        CheckpointManager::new(path).save_model(model)
    }
}
