//! # UNet-PSA
//!
//! A U-Net student network for binary segmentation whose first encoder stage uses
//! pyramid split attention, built with the Burn deep learning framework.
//!
//! ## Modules
//!
//! - `config`: configuration of the network and of its attention block.
//! - `error`: the custom error types used throughout the crate.
//! - `models`: the building blocks and the assembled encoder-decoder.
//! - `summary`: a per-stage table of output shapes and parameter counts.
//!
//! ## Key Components
//!
//! - `UNetPsa`: the model; `forward` returns the prediction together with the
//!   intermediate maps used for feature distillation.
//! - `UNetPsaConfig`: the configuration that drives the model's construction.
//! - `UNetPsaError`: the enum for all possible errors.

mod config;
mod error;
mod models;
mod summary;

#[doc(inline)]
pub use config::{PsaConfig, UNetPsaConfig, DEPTH, DOWNSAMPLE_FACTOR, PSA_BRANCHES};
#[doc(inline)]
pub use error::{UNetPsaError, UNetPsaResult};
#[doc(inline)]
pub use models::modules::{
    DoubleConvPsa, DoubleConvPsaConfig, FactorizedBlock, FactorizedBlockConfig, PsaModule,
    PsaModuleConfig, SeWeight, SeWeightConfig,
};
#[doc(inline)]
pub use models::unet::{UNetPsa, UNetPsaOutput, UNetPsaRecord};
#[doc(inline)]
pub use summary::{LayerSummary, ModelSummary};

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};

    pub type TestBackend = NdArray<f32>;

    pub type TestAutodiffBackend = Autodiff<TestBackend>;
}
