//! Configuration structures for the UNet-PSA model.
//!
//! `UNetPsaConfig` drives the construction of the whole network; `PsaConfig`
//! holds the hyperparameters of the pyramid split attention used in the first
//! encoder stage. Both derive Burn's `Config`, so they can be saved to and
//! loaded from JSON.

use burn::prelude::*;

use crate::error::{UNetPsaError, UNetPsaResult};

/// Number of 2x2 max-pool steps between the input and the bottleneck.
pub const DEPTH: usize = 4;

/// Spatial size divisor imposed by the encoder: every pool halves the resolution.
pub const DOWNSAMPLE_FACTOR: usize = 1 << DEPTH;

/// Number of parallel branches in the pyramid split attention.
pub const PSA_BRANCHES: usize = 4;

/// Hyperparameters of the pyramid split attention module.
#[derive(Config, Debug)]
pub struct PsaConfig {
    /// Kernel size of each branch, from the finest to the coarsest scale.
    #[config(default = "[3, 5, 7, 9]")]
    pub kernels: [usize; PSA_BRANCHES],
    /// Group count of each branch convolution.
    #[config(default = "[1, 2, 4, 8]")]
    pub groups: [usize; PSA_BRANCHES],
    /// Channel reduction ratio inside the squeeze-and-excitation gate.
    #[config(default = "8")]
    pub se_reduction: usize,
}

impl PsaConfig {
    /// Channels produced by each branch for a module with `planes` outputs.
    pub const fn branch_channels(&self, planes: usize) -> usize {
        planes / PSA_BRANCHES
    }

    /// Checks that a PSA module mapping `in_channels` to `planes` can be built.
    pub fn validate(&self, in_channels: usize, planes: usize) -> UNetPsaResult<()> {
        if planes == 0 || planes % PSA_BRANCHES != 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!(
                    "PSA planes must be a positive multiple of {PSA_BRANCHES}, got {planes}"
                ),
            });
        }
        let split = self.branch_channels(planes);

        for (&kernel, &groups) in self.kernels.iter().zip(self.groups.iter()) {
            if kernel % 2 == 0 {
                return Err(UNetPsaError::InvalidConfiguration {
                    reason: format!("PSA kernel sizes must be odd, got {kernel}"),
                });
            }
            if groups == 0 || in_channels % groups != 0 || split % groups != 0 {
                return Err(UNetPsaError::InvalidConfiguration {
                    reason: format!(
                        "PSA branch with {groups} groups cannot map {in_channels} to {split}"
                    ),
                });
            }
        }

        if self.se_reduction == 0 || split / self.se_reduction == 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!(
                    "SE reduction {} leaves no channels out of {split}",
                    self.se_reduction
                ),
            });
        }

        Ok(())
    }
}

/// Main configuration for the UNet-PSA model.
#[derive(Config, Debug)]
pub struct UNetPsaConfig {
    /// Number of input image channels.
    #[config(default = "3")]
    pub in_channels: usize,
    /// Number of predicted channels.
    #[config(default = "1")]
    pub out_channels: usize,
    /// Feature width of the first encoder stage; doubled at every stage below.
    #[config(default = "32")]
    pub init_features: usize,
    /// Pyramid split attention hyperparameters for the first encoder stage.
    #[config(default = "PsaConfig::new()")]
    pub psa: PsaConfig,
    /// Group count of the factorized `1xk` / `kx1` convolutions.
    #[config(default = "16")]
    pub block_groups: usize,
    /// Kernel length of the factorized convolutions.
    #[config(default = "5")]
    pub block_kernel: usize,
    /// Negative slope of the leaky ReLUs in the first encoder stage.
    #[config(default = "0.01")]
    pub leaky_slope: f64,
}

impl UNetPsaConfig {
    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(UNetPsaError::InvalidConfiguration)` if a channel count does not
    /// divide into the group count of a convolution consuming or producing it.
    pub fn validate(&self) -> UNetPsaResult<()> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!(
                    "Channel counts must be positive, got in={} out={}",
                    self.in_channels, self.out_channels
                ),
            });
        }

        let features = self.init_features;
        if features == 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: "init_features must be positive".to_owned(),
            });
        }

        // Every factorized block reads and writes a multiple of `init_features`.
        if self.block_groups == 0 || features % self.block_groups != 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!(
                    "init_features {features} is not divisible by block_groups {}",
                    self.block_groups
                ),
            });
        }

        if self.block_kernel % 2 == 0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!("block_kernel must be odd, got {}", self.block_kernel),
            });
        }

        if self.leaky_slope.is_nan() || self.leaky_slope < 0.0 {
            return Err(UNetPsaError::InvalidConfiguration {
                reason: format!("leaky_slope must be non-negative, got {}", self.leaky_slope),
            });
        }

        self.psa.validate(features, features)
    }

    /// Feature widths of the four encoder stages followed by the bottleneck.
    pub fn channel_schedule(&self) -> [usize; DEPTH + 1] {
        core::array::from_fn(|stage| self.init_features << stage)
    }
}
