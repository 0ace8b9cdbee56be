//! UNet-PSA Inference Example
//!
//! Predicts a segmentation map for one image and writes it as a grayscale PNG.
//!
//! ## Usage
//!
//! ```bash
//! # Untrained weights, original resolution rounded down to a multiple of 16
//! cargo run --bin inference -- image.jpg
//!
//! # Trained weights, 512x512 input, binary mask
//! cargo run --bin inference -- image.jpg --weights student.mpk --image-size 512 --threshold 0.5
//!
//! # Also write the four distillation feature maps
//! cargo run --bin inference -- image.jpg --save-hints
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use burn::module::Module;
use clap::Parser;
use image::imageops::FilterType;
use tracing::{debug, info};
use unet_psa::{UNetPsa, UNetPsaOutput};
use unet_psa_demos::{
    create_device, get_backend_name,
    image::{apply_threshold, feature_map_to_image, load_image, tensor_to_mask_image},
    init_tracing, load_model_config, load_settings, InferenceConfig, SelectedBackend,
    SelectedDevice,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input image
    input: PathBuf,

    /// Weights saved with Burn's `NamedMpkFileRecorder`
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Model configuration saved as JSON (defaults when omitted)
    #[arg(short, long)]
    model_config: Option<PathBuf>,

    /// Inference settings as JSON; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Square input size; rounded down to a multiple of 16
    #[arg(long)]
    image_size: Option<u32>,

    /// Threshold for binary mask (0.0-1.0)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Write channel-mean images of the four intermediate feature maps
    #[arg(long)]
    save_hints: bool,

    /// Keep the network resolution instead of resizing back to the input size
    #[arg(long)]
    keep_network_resolution: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config: InferenceConfig = load_settings(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if args.image_size.is_some() {
        config.image_size = args.image_size;
    }
    if args.threshold.is_some() {
        config.threshold = args.threshold;
    }
    config.save_hints |= args.save_hints;
    if args.keep_network_resolution {
        config.preserve_original_resolution = false;
    }

    if let Some(threshold) = config.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("Threshold must be within [0, 1], got {threshold}");
        }
    }
    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }

    fs::create_dir_all(&config.output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_path.display()
        )
    })?;

    let device = create_device();
    info!("Using backend: {}", get_backend_name());

    let model = load_model(
        args.model_config.as_deref(),
        args.weights.as_deref(),
        &device,
    )?;
    process_image(&model, &args.input, &config, &device)?;

    info!("Inference completed successfully!");
    Ok(())
}

fn load_model(
    model_config: Option<&Path>,
    weights: Option<&Path>,
    device: &SelectedDevice,
) -> Result<UNetPsa<SelectedBackend>> {
    let model = load_model_config(model_config)?.init::<SelectedBackend>(device)?;
    info!("Model has {} parameters", model.num_params());

    match weights {
        Some(path) => Ok(model.load_weights(path, device)?),
        None => {
            tracing::warn!("No weights given; running with freshly initialized parameters");
            Ok(model)
        }
    }
}

fn process_image(
    model: &UNetPsa<SelectedBackend>,
    input: &Path,
    config: &InferenceConfig,
    device: &SelectedDevice,
) -> Result<()> {
    let (tensor, (width, height)) =
        load_image::<SelectedBackend, _>(input, config.image_size, device)?;
    debug!(dims = ?tensor.dims(), "loaded input");

    let start = Instant::now();
    let UNetPsaOutput {
        prediction,
        enc1,
        enc3,
        dec3,
        dec1,
    } = model.forward(tensor)?;

    let prediction = match config.threshold {
        Some(threshold) => apply_threshold(prediction, threshold),
        None => prediction,
    };
    let mut mask = tensor_to_mask_image(prediction)?;
    info!("Forward pass took {:.2?}", start.elapsed());

    if config.preserve_original_resolution && (mask.width(), mask.height()) != (width, height) {
        let filter = if config.threshold.is_some() {
            FilterType::Nearest
        } else {
            FilterType::Triangle
        };
        mask = mask.resize_exact(width, height, filter);
    }

    let stem = input
        .file_stem()
        .context("Input path has no file name")?
        .to_string_lossy();

    let mask_path = config.output_path.join(format!("{stem}_mask.png"));
    mask.save(&mask_path)
        .with_context(|| format!("Failed to save mask: {}", mask_path.display()))?;
    info!("Saved mask to {}", mask_path.display());

    if config.save_hints {
        for (name, features) in [("enc1", enc1), ("enc3", enc3), ("dec3", dec3), ("dec1", dec1)] {
            let hint_path = config.output_path.join(format!("{stem}_{name}.png"));
            feature_map_to_image(features)?
                .save(&hint_path)
                .with_context(|| format!("Failed to save feature map: {}", hint_path.display()))?;
            debug!("Saved {name} to {}", hint_path.display());
        }
    }

    Ok(())
}
