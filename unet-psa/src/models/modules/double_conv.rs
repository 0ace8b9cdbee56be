use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    prelude::*,
};
use burn_extra_ops::kaiming_uniform;

use super::psa::{PsaModule, PsaModuleConfig};
use crate::{config::PsaConfig, error::UNetPsaResult};

/// Configuration for the `DoubleConvPsa` module.
#[derive(Config, Debug)]
pub struct DoubleConvPsaConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels.
    out_channels: usize,
    /// Attention hyperparameters for the block between the two convolutions.
    #[config(default = "PsaConfig::new()")]
    psa: PsaConfig,
    /// Negative slope of both leaky ReLUs.
    #[config(default = "0.01")]
    leaky_slope: f64,
}

impl DoubleConvPsaConfig {
    /// Initializes a new `DoubleConvPsa` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> UNetPsaResult<DoubleConvPsa<B>> {
        let conv = |in_channels: usize| {
            Conv2dConfig::new([in_channels, self.out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .with_initializer(kaiming_uniform(0.0))
                .init(device)
        };
        let leaky_relu = || {
            LeakyReluConfig::new()
                .with_negative_slope(self.leaky_slope)
                .init()
        };

        let psa = PsaModuleConfig::new(self.out_channels, self.out_channels)
            .with_psa(self.psa.clone())
            .init(device)?;

        Ok(DoubleConvPsa {
            conv1: conv(self.in_channels),
            bn1: BatchNormConfig::new(self.out_channels).init(device),
            lrelu1: leaky_relu(),
            psa,
            conv2: conv(self.out_channels),
            bn2: BatchNormConfig::new(self.out_channels).init(device),
            lrelu2: leaky_relu(),
        })
    }
}

/// First encoder stage: two 3x3 convolutions with pyramid split attention between.
///
/// conv -> bn -> leaky relu -> psa -> conv -> bn -> leaky relu
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct DoubleConvPsa<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    lrelu1: LeakyRelu,
    psa: PsaModule<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    lrelu2: LeakyRelu,
}

impl<B: Backend> DoubleConvPsa<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.bn1.forward(x);
        let x = self.lrelu1.forward(x);

        let x = self.psa.forward(x);

        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);
        self.lrelu2.forward(x)
    }
}
