//! # Branch-wise Softmax
//!
//! Multi-branch attention blocks stack the outputs of `n` parallel branches along
//! the channel axis, `[batch, n * c, h, w]`. These helpers treat the channel axis
//! as `[n, c]` and normalize across branches, so that for every batch item and
//! every channel index the `n` branch weights sum to one.

use burn::{prelude::*, tensor::activation::softmax};

/// Applies a softmax across `branches` groups stacked along the channel axis.
///
/// # Shapes
/// - input: `[batch_size, branches * channels, height, width]`
/// - output: `[batch_size, branches * channels, height, width]`
///
/// # Panics
///
/// Panics if the channel count is not divisible by `branches`.
pub fn branch_softmax<B: Backend>(x: Tensor<B, 4>, branches: usize) -> Tensor<B, 4> {
    let [batch_size, channels, height, width] = x.dims();
    assert!(
        branches > 0 && channels % branches == 0,
        "channel count {channels} is not divisible into {branches} branches"
    );
    let split = channels / branches;

    let x = x.reshape([batch_size, branches, split, height, width]);
    softmax(x, 1).reshape([batch_size, channels, height, width])
}

/// Reweights stacked branch features with branch-normalized channel weights.
///
/// `weights` holds one raw (pre-softmax) score per channel; scores are normalized
/// with [`branch_softmax`] before being broadcast over the spatial dimensions.
///
/// # Shapes
/// - features: `[batch_size, branches * channels, height, width]`
/// - weights: `[batch_size, branches * channels, 1, 1]`
/// - output: `[batch_size, branches * channels, height, width]`
pub fn branch_reweight<B: Backend>(
    features: Tensor<B, 4>,
    weights: Tensor<B, 4>,
    branches: usize,
) -> Tensor<B, 4> {
    features * branch_softmax(weights, branches)
}

#[cfg(test)]
mod tests {
    use burn::tensor::{Distribution, Tensor};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn branch_softmax_weights_sum_to_one_per_channel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [2, 4 * 3, 1, 1],
            Distribution::Normal(0.0, 3.0),
            &device,
        );

        let y = branch_softmax(x, 4);
        assert_eq!(y.dims(), [2, 12, 1, 1]);

        let sums = y.reshape([2, 4, 3]).sum_dim(1);
        let max_err = sums.sub_scalar(1.0).abs().max().into_scalar().elem::<f32>();
        assert!(max_err < 1e-5, "branch weights do not sum to one: {max_err}");
    }

    #[test]
    fn branch_softmax_is_uniform_for_equal_scores() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 8, 2, 2], &device);

        let y = branch_softmax(x, 4);
        let max_err = y.sub_scalar(0.25).abs().max().into_scalar().elem::<f32>();
        assert!(max_err < 1e-6);
    }

    #[test]
    fn branch_reweight_preserves_feature_shape() {
        let device = Default::default();
        let features = Tensor::<TestBackend, 4>::random(
            [2, 16, 5, 7],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let weights = Tensor::<TestBackend, 4>::random(
            [2, 16, 1, 1],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let out = branch_reweight(features.clone(), weights, 4);
        assert_eq!(out.dims(), [2, 16, 5, 7]);

        // Every weight is a probability, so magnitudes can only shrink.
        let growth = (out.abs() - features.abs()).max().into_scalar().elem::<f32>();
        assert!(growth <= 1e-6);
    }

    #[test]
    #[should_panic(expected = "not divisible")]
    fn branch_softmax_rejects_uneven_split() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 6, 1, 1], &device);
        let _ = branch_softmax(x, 4);
    }
}
