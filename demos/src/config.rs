//! Settings for the demo binaries.
//!
//! Each binary reads an optional JSON file into one of these structures and then
//! applies its command line overrides on top.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use unet_psa::UNetPsaConfig;

/// Settings for the `inference` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Square size the input is resized to. None keeps the original size rounded
    /// down to a multiple of 16.
    pub image_size: Option<u32>,
    /// Output directory for results.
    pub output_path: PathBuf,
    /// Threshold for a binary mask (None for a soft mask).
    pub threshold: Option<f32>,
    /// Whether to write the four intermediate feature maps.
    pub save_hints: bool,
    /// Whether to resize the prediction back to the input's original resolution.
    pub preserve_original_resolution: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            image_size: None,
            output_path: PathBuf::from("outputs"),
            threshold: None,
            save_hints: false,
            preserve_original_resolution: true,
        }
    }
}

/// Settings for the `bench` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Batch size of the dummy input.
    pub batch_size: usize,
    /// Height and width of the dummy input.
    pub image_size: usize,
    /// Untimed passes run before measuring.
    pub warmup: usize,
    /// Timed passes.
    pub iterations: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            image_size: 256,
            warmup: 2,
            iterations: 10,
        }
    }
}

/// Reads a JSON settings file, or returns the defaults when no path is given.
pub fn load_settings<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Reads a model configuration saved with `Config::save`, or returns the default one.
pub fn load_model_config(path: Option<&Path>) -> Result<UNetPsaConfig> {
    use burn::config::Config;

    match path {
        Some(path) => UNetPsaConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load model config {}: {e}", path.display())),
        None => Ok(UNetPsaConfig::new()),
    }
}
