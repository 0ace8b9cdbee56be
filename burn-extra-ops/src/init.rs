//! # Variance-scaling Initialization
//!
//! Fan-in Kaiming (He) uniform initialization for rectifier networks. Weights are
//! drawn from `U(-bound, bound)` with `bound = gain * sqrt(3 / fan_in)` and
//! `gain = sqrt(2 / (1 + a^2))`, where `a` is the negative slope of the rectifier
//! that follows the layer (`0` for ReLU).
//!
//! For a convolution, Burn computes `fan_in` as
//! `in_channels / groups * kernel_height * kernel_width`.
//!
//! Biases of Kaiming-initialized layers keep the conventional `U(-1/sqrt(fan_in),
//! 1/sqrt(fan_in))` rule, see [`bias_uniform`].

use burn::nn::Initializer;

/// Recommended gain for a (leaky) rectifier with the given negative slope.
pub fn leaky_relu_gain(negative_slope: f64) -> f64 {
    (2.0 / negative_slope.mul_add(negative_slope, 1.0)).sqrt()
}

/// Fan-in Kaiming-uniform initializer for layers followed by a rectifier.
pub fn kaiming_uniform(negative_slope: f64) -> Initializer {
    Initializer::KaimingUniform {
        gain: leaky_relu_gain(negative_slope),
        fan_out_only: false,
    }
}

/// Uniform bias initializer with bound `1 / sqrt(fan_in)`.
///
/// Burn applies a layer's initializer to its bias as well, so layers whose weights
/// use [`kaiming_uniform`] replace the bias with this one.
pub fn bias_uniform(fan_in: usize) -> Initializer {
    let bound = 1.0 / (fan_in as f64).sqrt();
    Initializer::Uniform {
        min: -bound,
        max: bound,
    }
}

/// Upper bound of the uniform distribution used by [`kaiming_uniform`].
pub fn fan_in_bound(fan_in: usize, negative_slope: f64) -> f64 {
    leaky_relu_gain(negative_slope) * (3.0 / fan_in as f64).sqrt()
}
