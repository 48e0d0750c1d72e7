// ============================================================
// Layer 5 — Predictor
// ============================================================
// Loads a saved classifier and produces class probabilities.
//
// Batches are built directly with ImageBatcher rather than a
// DataLoader so rows come back in exactly the order the
// examples were given (the aggregator scatters rows by position).

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Wgpu},
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::activation::softmax,
};
use ndarray::Array2;
use std::path::Path;

use crate::data::{batcher::ImageBatcher, dataset::ImageItem};
use crate::domain::{example::Example, traits::Predictor};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::ClassifierHandle;

pub type InferBackend = Wgpu;

pub struct BurnPredictor<B: Backend> {
    device:     B::Device,
    batch_size: usize,
}

impl BurnPredictor<InferBackend> {
    pub fn wgpu(batch_size: usize) -> Self {
        Self::new(WgpuDevice::default(), batch_size)
    }
}

impl<B: Backend> BurnPredictor<B> {
    pub fn new(device: B::Device, batch_size: usize) -> Self {
        Self { device, batch_size: batch_size.max(1) }
    }
}

impl<B: Backend> Predictor for BurnPredictor<B> {
    type Model = ClassifierHandle<B>;

    fn load(&self, path: &Path) -> Result<Self::Model> {
        CheckpointManager::new(path).load_model::<B>(&self.device)
    }

    fn predict(&self, handle: &Self::Model, examples: &[Example]) -> Result<Array2<f32>> {
        let classes = handle.config.num_classes;
        let batcher = ImageBatcher::<B>::new(self.device.clone(), handle.config.image_size);

        let mut probs: Vec<f32> = Vec::with_capacity(examples.len() * classes);
        for chunk in examples.chunks(self.batch_size) {
            let items: Vec<ImageItem> = chunk.iter().map(ImageItem::from).collect();
            let batch  = batcher.batch(items);
            let logits = handle.model.forward(batch.images);
            let rows   = softmax(logits, 1)
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;
            probs.extend(rows);
        }

        tracing::debug!("Predicted {} examples × {} classes", examples.len(), classes);
        Ok(Array2::from_shape_vec((examples.len(), classes), probs)?)
    }
}
