use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Relu, Sigmoid,
    },
    prelude::*,
};
use burn_extra_ops::{bias_uniform, kaiming_uniform};

/// Configuration for the `SeWeight` module.
#[derive(Config, Debug)]
pub struct SeWeightConfig {
    /// Number of gated channels.
    channels: usize,
    /// Channel reduction ratio of the bottleneck.
    #[config(default = "8")]
    reduction: usize,
}

impl SeWeightConfig {
    /// Initializes a new `SeWeight` module.
    ///
    /// Weights are Kaiming-uniform; biases are uniform in `+-1 / sqrt(fan_in)`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SeWeight<B> {
        let reduced = self.channels / self.reduction;

        let pointwise = |in_channels: usize, out_channels: usize| {
            let mut conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_initializer(kaiming_uniform(0.0))
                .init(device);
            conv.bias = Some(bias_uniform(in_channels).init([out_channels], device));
            conv
        };

        SeWeight {
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: pointwise(self.channels, reduced),
            relu: Relu::new(),
            fc2: pointwise(reduced, self.channels),
            sigmoid: Sigmoid::new(),
        }
    }
}

/// Squeeze-and-excitation gate producing one weight per channel.
///
/// global average pool -> 1x1 reduce -> ReLU -> 1x1 expand -> sigmoid
///
/// # Shapes
///   - input: `[batch_size, channels, height, width]`
///   - output: `[batch_size, channels, 1, 1]`
#[derive(Module, Debug)]
pub struct SeWeight<B: Backend> {
    avg_pool: AdaptiveAvgPool2d,
    fc1: Conv2d<B>,
    relu: Relu,
    fc2: Conv2d<B>,
    sigmoid: Sigmoid,
}

impl<B: Backend> SeWeight<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.avg_pool.forward(x);
        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.fc2.forward(x);
        self.sigmoid.forward(x)
    }
}
