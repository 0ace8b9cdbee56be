//! UNet-PSA Demos
//!
//! Small command line programs around the UNet-PSA model.
//!
//! ## Available Demos
//!
//! - `summary`: Per-stage output shapes and parameter counts
//! - `inference`: Predict a segmentation map for a single image
//! - `bench`: Forward-pass latency on dummy input
//!
//! ## Usage
//!
//! ```bash
//! # Print the layer table for 256x256 inputs
//! cargo run --bin summary -- --image-size 256
//!
//! # Run inference with trained weights
//! cargo run --release --bin inference -- image.jpg --weights student.mpk
//!
//! # Time 20 forward passes on the wgpu backend
//! cargo run --release --features wgpu --bin bench -- --iterations 20
//! ```

pub mod backend;
pub mod config;
pub mod image;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use config::{load_model_config, load_settings, BenchConfig, InferenceConfig};

use tracing_subscriber::filter::LevelFilter;

/// Installs a formatting subscriber for `level` (`error`, `warn`, `info`, `debug`
/// or `trace`); unknown names fall back to `info`.
pub fn init_tracing(level: &str) {
    let log_level_filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
