use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct ImageClassifierConfig {
    pub num_classes:  usize,
    #[config(default = "64")]
    pub image_size:   usize,
    #[config(default = "16")]
    pub base_filters: usize,
    #[config(default = "0.2")]
    pub dropout:      f64,
}

impl ImageClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageClassifier<B> {
        let f = self.base_filters;
        let blocks = vec![
            ConvBlock::new(3,     f,     device),
            ConvBlock::new(f,     f * 2, device),
            ConvBlock::new(f * 2, f * 4, device),
        ];
        let pool    = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dropout = DropoutConfig::new(self.dropout).init();
        let head    = LinearConfig::new(f * 4, self.num_classes).init(device);
        ImageClassifier { blocks, pool, dropout, head }
    }
}

/// Conv 3×3 → ReLU → MaxPool 2×2 (halves the spatial size).
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { conv, relu: Relu::new(), pool }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.relu.forward(self.conv.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct ImageClassifier<B: Backend> {
    pub blocks:  Vec<ConvBlock<B>>,
    pub pool:    AdaptiveAvgPool2d,
    pub dropout: Dropout,
    pub head:    Linear<B>,
}

impl<B: Backend> ImageClassifier<B> {
    /// images: [batch, 3, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        // Global average pool to [batch, channels, 1, 1] then flatten
        let [batch, channels, _, _] = x.dims();
        let x = self.pool.forward(x).reshape([batch, channels]);
        self.head.forward(self.dropout.forward(x))
    }

    /// Mean cross-entropy over the batch, plus the logits.
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }
}

/// A trained classifier together with the config that built it.
#[derive(Debug, Clone)]
pub struct ClassifierHandle<B: Backend> {
    pub model:  ImageClassifier<B>,
    pub config: ImageClassifierConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model  = ImageClassifierConfig::new(5)
            .with_base_filters(4)
            .init::<NdArray>(&device);
        let images = Tensor::<NdArray, 4>::zeros([2, 3, 16, 16], &device);
        assert_eq!(model.forward(images).dims(), [2, 5]);
    }

    #[test]
    fn test_loss_is_scalar() {
        let device  = Default::default();
        let model   = ImageClassifierConfig::new(2)
            .with_base_filters(4)
            .init::<NdArray>(&device);
        let images  = Tensor::<NdArray, 4>::ones([3, 3, 8, 8], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([0, 1, 1], &device);
        let (loss, logits) = model.forward_loss(images, targets);
        assert_eq!(loss.dims(), [1]);
        assert_eq!(logits.dims(), [3, 2]);
    }
}
