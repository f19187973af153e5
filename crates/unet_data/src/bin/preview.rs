//! Writes a handful of augmented image/mask pairs so a pipeline config can be
//! checked by eye before training.
//!
//! ```text
//! unet-data-preview data/ out/ --folder train --count 20 --config pipeline.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use unet_data::config::PipelineConfig;
use unet_data::generator::parse_color_modes;
use unet_data::logging::{init_logging, LogConfig, LogLevel};
use unet_data::write_preview;

#[derive(Parser, Debug)]
#[command(name = "unet-data-preview", about = "Preview augmented image/mask pairs")]
struct Args {
    /// Dataset root containing `<folder>/image` and `<folder>/mask`
    dataset_dir: PathBuf,

    /// Directory receiving `GenConfigTest/`
    outdir: PathBuf,

    /// Sub-folder of the dataset to read
    #[arg(short, long, default_value = "train")]
    folder: String,

    /// Number of pairs to write
    #[arg(short, long, default_value = "20")]
    count: usize,

    /// JSON pipeline config (defaults apply to missing fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Image color mode override: L or RGB
    #[arg(long)]
    image_mode: Option<String>,

    /// Mask color mode override: L or RGB
    #[arg(long)]
    mask_mode: Option<String>,

    /// Seed override
    #[arg(long)]
    seed: Option<u64>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level: LogLevel = args.log_level.parse()?;
    init_logging(&LogConfig::with_level(level))?;

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let image_mode = args
        .image_mode
        .unwrap_or_else(|| config.image_color_mode.to_string());
    let mask_mode = args
        .mask_mode
        .unwrap_or_else(|| config.mask_color_mode.to_string());
    let (image_mode, mask_mode) = parse_color_modes(&image_mode, &mask_mode)?;
    config.image_color_mode = image_mode;
    config.mask_color_mode = mask_mode;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let preview_dir = write_preview(
        &config,
        &args.dataset_dir,
        &args.folder,
        &args.outdir,
        args.count,
    )
    .context("Preview failed")?;

    tracing::info!(dir = %preview_dir.display(), "preview written");
    Ok(())
}
