//! # Model Architectures
//!
//! - `modules`: building blocks (pyramid split attention, its squeeze-and-excitation
//!   gate, the first-stage double convolution and the factorized block).
//! - `unet`: the encoder-decoder network assembled from those blocks.

pub mod modules;
pub mod unet;
