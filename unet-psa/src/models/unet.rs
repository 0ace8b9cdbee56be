//! # UNet-PSA Model Implementation
//!
//! A four-level U-Net. The first encoder stage is a double convolution with pyramid
//! split attention; every other stage, the bottleneck included, is a factorized
//! separable block. Encoder stages are separated by 2x2 max pooling, decoder stages
//! upsample with 2x2 transposed convolutions and concatenate the matching encoder
//! map before their block. A 1x1 convolution and a sigmoid produce the prediction.
//!
//! The forward pass also hands back four intermediate maps (first and third encoder
//! stages, third and first decoder stages) for feature-level distillation.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Sigmoid,
    },
    prelude::*,
};

use super::modules::{DoubleConvPsa, DoubleConvPsaConfig, FactorizedBlock, FactorizedBlockConfig};
use crate::{
    config::{UNetPsaConfig, DOWNSAMPLE_FACTOR},
    error::{UNetPsaError, UNetPsaResult},
};

impl UNetPsaConfig {
    /// Initializes a `UNetPsa` model with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `device` - The device to create the model on.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> UNetPsaResult<UNetPsa<B>> {
        self.validate()?;

        let [f1, f2, f4, f8, f16] = self.channel_schedule();
        tracing::debug!(
            in_channels = self.in_channels,
            out_channels = self.out_channels,
            channels = ?[f1, f2, f4, f8, f16],
            "building UNet-PSA",
        );

        let block = |in_channels: usize, out_channels: usize, name: &str| {
            FactorizedBlockConfig::new(in_channels, out_channels, name.to_owned())
                .with_groups(self.block_groups)
                .with_kernel(self.block_kernel)
                .init(device)
        };
        let upconv = |in_channels: usize, out_channels: usize| {
            ConvTranspose2dConfig::new([in_channels, out_channels], [2, 2])
                .with_stride([2, 2])
                .init(device)
        };

        let encoder1 = DoubleConvPsaConfig::new(self.in_channels, f1)
            .with_psa(self.psa.clone())
            .with_leaky_slope(self.leaky_slope)
            .init(device)?;

        Ok(UNetPsa {
            encoder1,
            encoder2: block(f1, f2, "enc2"),
            encoder3: block(f2, f4, "enc3"),
            encoder4: block(f4, f8, "enc4"),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottleneck: block(f8, f16, "bottleneck"),
            upconv4: upconv(f16, f8),
            decoder4: block(f8 * 2, f8, "dec4"),
            upconv3: upconv(f8, f4),
            decoder3: block(f4 * 2, f4, "dec3"),
            upconv2: upconv(f4, f2),
            decoder2: block(f2 * 2, f2, "dec2"),
            upconv1: upconv(f2, f1),
            decoder1: block(f1 * 2, f1, "dec1"),
            head: Conv2dConfig::new([f1, self.out_channels], [1, 1]).init(device),
            sigmoid: Sigmoid::new(),
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            init_features: self.init_features,
        })
    }
}

/// Result of a forward pass: the prediction plus the distillation feature maps.
#[derive(Debug, Clone)]
pub struct UNetPsaOutput<B: Backend> {
    /// Sigmoid prediction `[batch_size, out_channels, height, width]`.
    pub prediction: Tensor<B, 4>,
    /// First encoder stage `[batch_size, F, height, width]`.
    pub enc1: Tensor<B, 4>,
    /// Third encoder stage `[batch_size, 4F, height / 4, width / 4]`.
    pub enc3: Tensor<B, 4>,
    /// Third decoder stage `[batch_size, 4F, height / 4, width / 4]`.
    pub dec3: Tensor<B, 4>,
    /// First decoder stage `[batch_size, F, height, width]`.
    pub dec1: Tensor<B, 4>,
}

impl<B: Backend> UNetPsaOutput<B> {
    /// Splits the output into `(prediction, enc1, enc3, dec3, dec1)`.
    pub fn into_tuple(
        self,
    ) -> (
        Tensor<B, 4>,
        Tensor<B, 4>,
        Tensor<B, 4>,
        Tensor<B, 4>,
        Tensor<B, 4>,
    ) {
        (self.prediction, self.enc1, self.enc3, self.dec3, self.dec1)
    }

    /// The intermediate feature maps, in `enc1, enc3, dec3, dec1` order.
    pub fn hints(&self) -> [&Tensor<B, 4>; 4] {
        [&self.enc1, &self.enc3, &self.dec3, &self.dec1]
    }
}

/// The UNet-PSA student network.
#[derive(Module, Debug)]
pub struct UNetPsa<B: Backend> {
    pub(crate) encoder1: DoubleConvPsa<B>,
    pub(crate) encoder2: FactorizedBlock<B>,
    pub(crate) encoder3: FactorizedBlock<B>,
    pub(crate) encoder4: FactorizedBlock<B>,
    /// Shared by the four downsampling steps; it has no parameters.
    pool: MaxPool2d,
    pub(crate) bottleneck: FactorizedBlock<B>,
    pub(crate) upconv4: ConvTranspose2d<B>,
    pub(crate) decoder4: FactorizedBlock<B>,
    pub(crate) upconv3: ConvTranspose2d<B>,
    pub(crate) decoder3: FactorizedBlock<B>,
    pub(crate) upconv2: ConvTranspose2d<B>,
    pub(crate) decoder2: FactorizedBlock<B>,
    pub(crate) upconv1: ConvTranspose2d<B>,
    pub(crate) decoder1: FactorizedBlock<B>,
    pub(crate) head: Conv2d<B>,
    sigmoid: Sigmoid,
    in_channels: usize,
    out_channels: usize,
    init_features: usize,
}

impl<B: Backend> UNetPsa<B> {
    /// Forward pass through the encoder and decoder.
    ///
    /// # Shapes
    /// * `x` - Input tensor: `[batch_size, in_channels, height, width]`
    /// * Returns - See [`UNetPsaOutput`].
    ///
    /// # Errors
    ///
    /// Returns `UNetPsaError::InvalidTensorShape` if the channel count differs from
    /// the configured one or the spatial size is not a positive multiple of 16.
    pub fn forward(&self, x: Tensor<B, 4>) -> UNetPsaResult<UNetPsaOutput<B>> {
        self.check_input(x.dims())?;

        let enc1 = self.encoder1.forward(x);
        let enc2 = self.encoder2.forward(self.pool.forward(enc1.clone()));
        let enc3 = self.encoder3.forward(self.pool.forward(enc2.clone()));
        let enc4 = self.encoder4.forward(self.pool.forward(enc3.clone()));

        let bottleneck = self.bottleneck.forward(self.pool.forward(enc4.clone()));

        let dec4 = Self::decode(&self.upconv4, &self.decoder4, bottleneck, enc4);
        let dec3 = Self::decode(&self.upconv3, &self.decoder3, dec4, enc3.clone());
        let dec2 = Self::decode(&self.upconv2, &self.decoder2, dec3.clone(), enc2);
        let dec1 = Self::decode(&self.upconv1, &self.decoder1, dec2, enc1.clone());

        let prediction = self.sigmoid.forward(self.head.forward(dec1.clone()));

        Ok(UNetPsaOutput {
            prediction,
            enc1,
            enc3,
            dec3,
            dec1,
        })
    }

    /// Forward pass returning only the prediction.
    pub fn predict(&self, x: Tensor<B, 4>) -> UNetPsaResult<Tensor<B, 4>> {
        self.forward(x).map(|output| output.prediction)
    }

    /// Upsample, append the skip connection along channels, and run the stage block.
    fn decode(
        upconv: &ConvTranspose2d<B>,
        decoder: &FactorizedBlock<B>,
        x: Tensor<B, 4>,
        skip: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = upconv.forward(x);
        decoder.forward(Tensor::cat(vec![x, skip], 1))
    }

    /// Checks that an input of shape `[batch_size, channels, height, width]` can
    /// flow through the network.
    pub fn check_input(&self, dims: [usize; 4]) -> UNetPsaResult<()> {
        let [batch_size, channels, height, width] = dims;
        let fits = |size: usize| size > 0 && size % DOWNSAMPLE_FACTOR == 0;

        if batch_size == 0 || channels != self.in_channels || !fits(height) || !fits(width) {
            return Err(UNetPsaError::InvalidTensorShape {
                expected: format!(
                    "[batch_size, {}, height, width], sides multiples of {DOWNSAMPLE_FACTOR}",
                    self.in_channels
                ),
                actual: format!("{dims:?}"),
            });
        }

        Ok(())
    }

    /// Number of input channels the model was built for.
    pub const fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of predicted channels.
    pub const fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Feature width of the first encoder stage.
    pub const fn init_features(&self) -> usize {
        self.init_features
    }
}

#[cfg(feature = "record")]
impl<B: Backend> UNetPsa<B> {
    /// Loads weights saved with Burn's `NamedMpkFileRecorder` at full precision.
    ///
    /// # Errors
    ///
    /// Returns `UNetPsaError::WeightLoadingFailed` if the file cannot be read or does
    /// not match the model structure.
    pub fn load_weights(
        self,
        path: impl Into<std::path::PathBuf>,
        device: &Device<B>,
    ) -> UNetPsaResult<Self> {
        use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};

        let path = path.into();
        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .map_err(|e| UNetPsaError::WeightLoadingFailed {
                reason: format!("{}: {e}", path.display()),
            })?;

        tracing::info!(path = %path.display(), "loaded weights");
        Ok(self.load_record(record))
    }
}
