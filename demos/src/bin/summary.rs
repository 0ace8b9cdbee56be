//! Prints a layer-by-layer summary of the UNet-PSA model.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin summary -- --image-size 512
//! cargo run --bin summary -- --model-config unet_psa.json --channels 1
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use unet_psa::ModelSummary;
use unet_psa_demos::{
    create_device, get_backend_name, init_tracing, load_model_config, SelectedBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model configuration saved as JSON (defaults when omitted)
    #[arg(short, long)]
    model_config: Option<PathBuf>,

    /// Height and width of the summarized input
    #[arg(long, default_value = "256")]
    image_size: usize,

    /// Input channels; defaults to the model's `in_channels`
    #[arg(long)]
    channels: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut model_config = load_model_config(args.model_config.as_deref())?;
    if let Some(channels) = args.channels {
        model_config.in_channels = channels;
    }

    let device = create_device();
    info!("Using backend: {}", get_backend_name());

    let model = model_config.init::<SelectedBackend>(&device)?;
    let summary = ModelSummary::new(
        &model,
        [model.in_channels(), args.image_size, args.image_size],
    )?;

    println!("{summary}");
    Ok(())
}
