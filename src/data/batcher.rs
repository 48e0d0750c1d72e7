// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ImageItem> into
// tensors the classifier can consume.
//
// How batching works here:
//   Input:  N ImageItems (file path + label)
//   Output: ImageBatch with
//             images  [N, 3, S, S]  f32 in [0, 1], CHW order
//             targets [N]           class indices
//
// Every image is decoded with the `image` crate and resized to
// S×S, so batches always have a fixed shape.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use image::imageops::FilterType;

use crate::data::dataset::ImageItem;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Pixel data — shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Ground truth class indices — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device:     B::Device,
    pub image_size: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }

    /// Decode one image into CHW floats, appending to `out`.
    /// An unreadable file becomes a black image so one bad asset
    /// cannot abort a whole training run.
    fn push_pixels(&self, item: &ImageItem, out: &mut Vec<f32>) {
        let size = self.image_size as u32;
        let rgb = match image::open(&item.path) {
            Ok(img) => img.resize_exact(size, size, FilterType::Triangle).to_rgb8(),
            Err(e) => {
                tracing::warn!("Cannot decode '{}': {} (using a blank image)", item.path.display(), e);
                image::RgbImage::new(size, size)
            }
        };

        for c in 0..3 {
            for y in 0..size {
                for x in 0..size {
                    out.push(rgb.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();
        let size       = self.image_size;

        let mut pixels = Vec::with_capacity(batch_size * 3 * size * size);
        for item in &items {
            self.push_pixels(item, &mut pixels);
        }

        let labels: Vec<i32> = items.iter().map(|i| i.label as i32).collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, 3, size, size]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}
