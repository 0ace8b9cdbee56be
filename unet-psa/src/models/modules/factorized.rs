//! Factorized separable convolution block.
//!
//! Stands in for the classic U-Net double 3x3 convolution. Each half is a grouped
//! `1xk` (then `kx1`) convolution followed by a 1x1 pointwise convolution, batch
//! norm and ReLU, which keeps the receptive field while cutting parameters.

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};
use burn_extra_ops::kaiming_uniform;

/// Configuration for the `FactorizedBlock` module.
#[derive(Config, Debug)]
pub struct FactorizedBlockConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels.
    out_channels: usize,
    /// Stage label used in summaries and logs (e.g. `enc2`, `dec1`).
    name: String,
    /// Group count of the `1xk` and `kx1` convolutions.
    #[config(default = "16")]
    groups: usize,
    /// Length of the factorized kernels.
    #[config(default = "5")]
    kernel: usize,
}

impl FactorizedBlockConfig {
    /// Initializes a new `FactorizedBlock` module.
    ///
    /// Channel counts must be divisible by `groups`; `UNetPsaConfig::validate`
    /// guarantees this for every stage of the network.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> FactorizedBlock<B> {
        let pad = self.kernel / 2;

        let spatial = |in_channels: usize, kernel_size: [usize; 2], padding| {
            Conv2dConfig::new([in_channels, self.out_channels], kernel_size)
                .with_padding(padding)
                .with_groups(self.groups)
                .with_bias(false)
                .with_initializer(kaiming_uniform(0.0))
                .init(device)
        };
        let pointwise = || {
            Conv2dConfig::new([self.out_channels, self.out_channels], [1, 1])
                .with_bias(false)
                .with_initializer(kaiming_uniform(0.0))
                .init(device)
        };

        FactorizedBlock {
            row_conv1: spatial(
                self.in_channels,
                [1, self.kernel],
                PaddingConfig2d::Explicit(0, pad),
            ),
            point_conv1: pointwise(),
            norm1: BatchNormConfig::new(self.out_channels).init(device),
            relu1: Relu::new(),
            col_conv2: spatial(
                self.out_channels,
                [self.kernel, 1],
                PaddingConfig2d::Explicit(pad, 0),
            ),
            point_conv2: pointwise(),
            norm2: BatchNormConfig::new(self.out_channels).init(device),
            relu2: Relu::new(),
            name: Ignored(self.name.clone()),
        }
    }
}

/// Factorized convolution block used by every stage except the first encoder.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct FactorizedBlock<B: Backend> {
    /// Grouped `1xk` convolution.
    pub(crate) row_conv1: Conv2d<B>,
    point_conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    relu1: Relu,
    /// Grouped `kx1` convolution.
    col_conv2: Conv2d<B>,
    point_conv2: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    relu2: Relu,
    name: Ignored<String>,
}

impl<B: Backend> FactorizedBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.row_conv1.forward(x);
        let x = self.point_conv1.forward(x);
        let x = self.norm1.forward(x);
        let x = self.relu1.forward(x);

        let x = self.col_conv2.forward(x);
        let x = self.point_conv2.forward(x);
        let x = self.norm2.forward(x);
        self.relu2.forward(x)
    }

    /// Stage label given at construction.
    pub fn name(&self) -> &str {
        &self.name.0
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{Distribution, Tensor};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn factorized_block_preserves_spatial_size() {
        let device = Default::default();
        let block =
            FactorizedBlockConfig::new(32, 64, "enc2".to_owned()).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random(
            [2, 32, 8, 6],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let out = block.forward(x);
        assert_eq!(out.dims(), [2, 64, 8, 6]);
        assert_eq!(block.name(), "enc2");
    }

    #[test]
    fn factorized_block_output_is_rectified() {
        let device = Default::default();
        let block =
            FactorizedBlockConfig::new(16, 16, "dec1".to_owned()).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random(
            [1, 16, 5, 5],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let min = block.forward(x).min().into_scalar().elem::<f32>();
        assert!(min >= 0.0);
    }

    #[test]
    fn factorized_block_is_lighter_than_dense_convs() {
        let device = Default::default();
        let block =
            FactorizedBlockConfig::new(64, 32, "dec2".to_owned()).init::<TestBackend>(&device);

        // Two dense 3x3 convs (64->32, 32->32).
        let dense = 64 * 32 * 9 + 32 * 32 * 9;
        // 1x5 grouped (64/16 * 5 per filter), 1x1, 5x1 grouped (32/16 * 5), 1x1.
        let factorized = 32 * 4 * 5 + 32 * 32 + 32 * 2 * 5 + 32 * 32;
        let convs = block.row_conv1.num_params()
            + block.point_conv1.num_params()
            + block.col_conv2.num_params()
            + block.point_conv2.num_params();
        assert_eq!(convs, factorized);
        assert!(block.num_params() > convs);
        assert!(factorized < dense);
    }
}
