use thiserror::Error;

/// The error type for `unet-psa` operations.
///
/// Covers configuration issues detected before any layer is built, input tensors
/// the network cannot process, and failures while restoring saved weights.
#[derive(Error, Debug)]
pub enum UNetPsaError {
    /// Error for when an invalid model configuration is provided.
    /// This can happen if channel counts do not fit the grouped convolutions.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when loading model weights fails.
    #[error("Failed to load weights: {reason}")]
    WeightLoadingFailed {
        /// The reason for the weight loading failure.
        reason: String,
    },
}

/// A specialized `Result` type for `unet-psa` operations.
pub type UNetPsaResult<T> = Result<T, UNetPsaError>;
