//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in deep learning but are not
//! yet available in the core Burn framework.

use burn::prelude::*;

mod branch;
mod init;

// Convenient re-exports
pub use branch::{branch_reweight, branch_softmax};
pub use init::{bias_uniform, fan_in_bound, kaiming_uniform, leaky_relu_gain};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend> {
    /// Softmax across `branches` groups stacked along the channel axis
    fn branch_softmax(self, branches: usize) -> Self;
}

impl<B: Backend> TensorExtraOps<B> for Tensor<B, 4> {
    fn branch_softmax(self, branches: usize) -> Self {
        branch_softmax(self, branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::Tensor,
    };

    pub type TestBackend = NdArray<f32>;

    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn test_tensor_extra_ops() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::random(
            [2, 8, 4, 5],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let result = tensor.clone().branch_softmax(4);
        assert_eq!(result.dims(), tensor.dims());
    }

    #[test]
    fn branch_softmax_propagates_gradients() {
        let device = Default::default();
        let scores = Tensor::<TestAutodiffBackend, 4>::random(
            [1, 8, 1, 1],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        )
        .require_grad();
        let features = Tensor::<TestAutodiffBackend, 4>::ones([1, 8, 3, 3], &device);

        let out = branch_reweight(features, scores.clone(), 4);
        let grads = out.sum().backward();

        let grad = scores.grad(&grads).expect("scores should receive a gradient");
        assert_eq!(grad.dims(), [1, 8, 1, 1]);

        // Each branch group sums to one, so the total is constant in the scores.
        let max = grad.abs().max().into_scalar().elem::<f32>();
        assert!(max < 1e-4);
    }
}
