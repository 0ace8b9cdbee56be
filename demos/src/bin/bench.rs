//! Measures forward-pass latency of the UNet-PSA model on dummy input.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin bench -- --image-size 512 --iterations 20
//! cargo run --release --features wgpu --bin bench -- --batch-size 4
//! ```

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use tracing::{debug, info};
use unet_psa_demos::{
    create_device, get_backend_name, init_tracing, load_model_config, load_settings, BenchConfig,
    SelectedBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model configuration saved as JSON (defaults when omitted)
    #[arg(short, long)]
    model_config: Option<PathBuf>,

    /// Benchmark settings as JSON; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Batch size of the dummy input
    #[arg(long)]
    batch_size: Option<usize>,

    /// Height and width of the dummy input (multiple of 16)
    #[arg(long)]
    image_size: Option<usize>,

    /// Untimed passes before measuring
    #[arg(long)]
    warmup: Option<usize>,

    /// Timed passes
    #[arg(long)]
    iterations: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config: BenchConfig = load_settings(args.config.as_deref())?;
    config.batch_size = args.batch_size.unwrap_or(config.batch_size);
    config.image_size = args.image_size.unwrap_or(config.image_size);
    config.warmup = args.warmup.unwrap_or(config.warmup);
    config.iterations = args.iterations.unwrap_or(config.iterations);
    if config.iterations == 0 {
        anyhow::bail!("At least one timed iteration is required");
    }

    let device = create_device();
    info!("Using backend: {}", get_backend_name());

    let model = load_model_config(args.model_config.as_deref())?.init::<SelectedBackend>(&device)?;
    let shape = [
        config.batch_size,
        model.in_channels(),
        config.image_size,
        config.image_size,
    ];
    model.check_input(shape)?;
    info!(?shape, params = model.num_params(), "benchmarking");

    let input = Tensor::<SelectedBackend, 4>::zeros(shape, &device);

    for _ in 0..config.warmup {
        // Reading the prediction back forces lazy backends to finish the pass.
        let _ = model.predict(input.clone())?.into_data();
    }

    let mut timings = Vec::with_capacity(config.iterations);
    for iteration in 0..config.iterations {
        let start = Instant::now();
        let _ = model.predict(input.clone())?.into_data();
        let elapsed = start.elapsed();
        debug!(iteration, ?elapsed, "forward pass");
        timings.push(elapsed);
    }

    let total: Duration = timings.iter().sum();
    let mean = total / config.iterations as u32;
    let min = timings.iter().min().copied().unwrap_or_default();
    let max = timings.iter().max().copied().unwrap_or_default();
    let throughput = (config.batch_size * config.iterations) as f64 / total.as_secs_f64();

    println!("Backend:     {}", get_backend_name());
    println!("Input:       {shape:?}");
    println!("Iterations:  {}", config.iterations);
    println!("Mean:        {mean:.2?}");
    println!("Min:         {min:.2?}");
    println!("Max:         {max:.2?}");
    println!("Throughput:  {throughput:.2} images/s");

    Ok(())
}
