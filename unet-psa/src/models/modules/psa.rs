//! Pyramid split attention (PSA).
//!
//! Four parallel convolutions with growing kernel size and group count look at the
//! same input at different scales. A shared squeeze-and-excitation gate scores the
//! channels of every branch, the scores are normalized across branches with a
//! softmax, and the reweighted branch maps are concatenated back to `planes`
//! channels.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};
use burn_extra_ops::{branch_reweight, kaiming_uniform, TensorExtraOps};

use super::se_weight::{SeWeight, SeWeightConfig};
use crate::{
    config::{PsaConfig, PSA_BRANCHES},
    error::UNetPsaResult,
};

/// Configuration for the `PsaModule`.
#[derive(Config, Debug)]
pub struct PsaModuleConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels, split evenly across the branches.
    planes: usize,
    /// Branch kernels, groups and gate reduction.
    #[config(default = "PsaConfig::new()")]
    psa: PsaConfig,
}

impl PsaModuleConfig {
    /// Initializes a new `PsaModule`.
    ///
    /// # Errors
    ///
    /// Returns an error if `planes` does not split into the branches or a branch
    /// group count does not divide its channel counts.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> UNetPsaResult<PsaModule<B>> {
        self.psa.validate(self.in_channels, self.planes)?;
        let split = self.psa.branch_channels(self.planes);

        let branches = self
            .psa
            .kernels
            .iter()
            .zip(self.psa.groups.iter())
            .map(|(&kernel, &groups)| {
                let padding = kernel / 2;
                Conv2dConfig::new([self.in_channels, split], [kernel, kernel])
                    .with_padding(PaddingConfig2d::Explicit(padding, padding))
                    .with_groups(groups)
                    .with_bias(false)
                    .with_initializer(kaiming_uniform(0.0))
                    .init(device)
            })
            .collect();

        let se = SeWeightConfig::new(split)
            .with_reduction(self.psa.se_reduction)
            .init(device);

        Ok(PsaModule {
            branches,
            se,
            split_channels: split,
        })
    }
}

/// Pyramid split attention module.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, planes, height, width]`
#[derive(Module, Debug)]
pub struct PsaModule<B: Backend> {
    /// One convolution per scale, finest first.
    branches: Vec<Conv2d<B>>,
    /// Gate shared by every branch.
    se: SeWeight<B>,
    split_channels: usize,
}

impl<B: Backend> PsaModule<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let (feats, scores) = self.branch_maps(x);
        branch_reweight(feats, scores, PSA_BRANCHES)
    }

    /// Forward pass that also returns the branch-normalized attention.
    ///
    /// # Returns
    /// The output feature map and the attention weights of shape
    /// `[batch_size, branches, planes / branches]`. Branches are stacked coarsest
    /// first, and for every channel index the branch weights sum to one.
    pub fn forward_with_attention(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 3>) {
        let (feats, scores) = self.branch_maps(x);

        let attention = scores.branch_softmax(PSA_BRANCHES);
        let out = feats * attention.clone();

        let [batch_size, _, _, _] = attention.dims();
        let attention = attention.reshape([batch_size, PSA_BRANCHES, self.split_channels]);

        (out, attention)
    }

    /// Branch feature maps and their raw gate scores, each concatenated along
    /// channels with the coarsest scale first.
    fn branch_maps(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let feats = self
            .branches
            .iter()
            .map(|conv| conv.forward(x.clone()))
            .collect::<Vec<_>>();
        let scores = feats
            .iter()
            .map(|feat| self.se.forward(feat.clone()))
            .collect::<Vec<_>>();

        (
            Tensor::cat(feats.into_iter().rev().collect(), 1),
            Tensor::cat(scores.into_iter().rev().collect(), 1),
        )
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{Distribution, Tensor};

    use super::*;
    use crate::{error::UNetPsaError, tests::TestBackend};

    #[test]
    fn psa_preserves_spatial_size_and_restores_planes() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random(
            [2, 32, 12, 10],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let out = psa.forward(x);
        assert_eq!(out.dims(), [2, 32, 12, 10]);
    }

    #[test]
    fn psa_attention_sums_to_one_across_branches() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random(
            [3, 32, 8, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let (_, attention) = psa.forward_with_attention(x);
        assert_eq!(attention.dims(), [3, 4, 8]);

        let sums = attention.sum_dim(1);
        let max_err = sums.sub_scalar(1.0).abs().max().into_scalar().elem::<f32>();
        assert!(max_err < 1e-5);
    }

    #[test]
    fn psa_branch_parameters_follow_group_schedule() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();

        // Branch weights: 8 * (32 / g) * k * k for (k, g) in (3,1) (5,2) (7,4) (9,8).
        let branches = 8 * (32 * 9 + 16 * 25 + 8 * 49 + 4 * 81);
        // Shared gate on 8 channels with reduction 8.
        let gate = 8 + 1 + 8 + 8;
        assert_eq!(psa.num_params(), branches + gate);
    }

    #[test]
    fn psa_rejects_indivisible_planes() {
        let device = Default::default();
        let result = PsaModuleConfig::new(32, 30).init::<TestBackend>(&device);

        match result {
            Err(UNetPsaError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("multiple of 4"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn psa_stacks_branches_coarsest_first() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random(
            [2, 32, 8, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let (out, attention) = psa.forward_with_attention(x.clone());
        let split = 8;

        // Output slot i holds branch 3 - i scaled by attention slot i.
        for slot in 0..PSA_BRANCHES {
            let branch = PSA_BRANCHES - 1 - slot;
            let weights = attention
                .clone()
                .slice([0..2, slot..slot + 1, 0..split])
                .reshape([2, split, 1, 1]);
            let expected = psa.branches[branch].forward(x.clone()) * weights;
            let actual = out
                .clone()
                .slice([0..2, slot * split..(slot + 1) * split, 0..8, 0..8]);

            let err = (actual - expected).abs().max().into_scalar().elem::<f32>();
            assert!(err < 1e-5, "slot {slot} does not hold branch {branch}: {err}");
        }
    }

    #[test]
    fn psa_forward_matches_attention_path() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 32, 6, 6],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let plain = psa.forward(x.clone());
        let (with_attention, _) = psa.forward_with_attention(x);

        let err = (plain - with_attention).abs().max().into_scalar().elem::<f32>();
        assert!(err < 1e-6);
    }

    #[test]
    fn psa_branch_weights_use_rectifier_gain() {
        let device = Default::default();
        let psa = PsaModuleConfig::new(32, 32)
            .init::<TestBackend>(&device)
            .unwrap();

        // 3x3 dense branch: fan_in = 32 * 9.
        let max = psa.branches[0].weight.val().abs().max().into_scalar().elem::<f32>();
        assert!(max <= burn_extra_ops::fan_in_bound(32 * 9, 0.0) as f32);
        assert!(max > 1.0 / (32.0f32 * 9.0).sqrt());
    }
}
