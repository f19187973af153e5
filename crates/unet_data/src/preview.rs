//! Writes augmented pairs to disk so augmentation settings can be inspected.

use crate::config::PipelineConfig;
use crate::dataloader::{with_scoped_rng, worker_rng};
use crate::generator::segmentation_dataset;
use crate::sampler::{RandomSampler, Sampler};
use anyhow::{ensure, Context, Result};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the directory created under the output directory.
pub const PREVIEW_DIR: &str = "GenConfigTest";

/// Recreates `<outdir>/GenConfigTest/{image,mask}` and writes `count`
/// augmented pairs as `0000.png`, `0001.png`, ...
///
/// Pairs are visited in shuffled order; when `count` exceeds the number of
/// pairs every further pass uses a new permutation. Images are written
/// after augmentation and before rescaling, i.e. as 8-bit PNGs in their
/// pipeline color mode.
///
/// Returns the preview directory.
pub fn write_preview(
    config: &PipelineConfig,
    dataset_dir: impl AsRef<Path>,
    folder: &str,
    outdir: impl AsRef<Path>,
    count: usize,
) -> Result<PathBuf> {
    ensure!(count > 0, "Preview count must be > 0");
    let dataset = segmentation_dataset(config, dataset_dir, folder)?;

    let preview_dir = outdir.as_ref().join(PREVIEW_DIR);
    let image_dir = preview_dir.join("image");
    let mask_dir = preview_dir.join("mask");
    if preview_dir.exists() {
        fs::remove_dir_all(&preview_dir)
            .with_context(|| format!("Failed to remove {}", preview_dir.display()))?;
    }
    for dir in [&image_dir, &mask_dir] {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(seed, count, dir = %preview_dir.display(), "writing augmentation preview");

    let sampler = RandomSampler::new(dataset.len(), seed)?;
    let order = (0..).flat_map(|pass| sampler.iter(pass)).take(count);
    let mut rng = worker_rng(0, 0, seed);

    for (i, index) in order.enumerate() {
        let pair = with_scoped_rng(&mut rng, || dataset.augmented_pair(index))?;
        let name = format!("{:04}.png", i);
        pair.image
            .save(image_dir.join(&name))
            .with_context(|| format!("Failed to write preview image {}", name))?;
        pair.mask
            .save(mask_dir.join(&name))
            .with_context(|| format!("Failed to write preview mask {}", name))?;
    }
    Ok(preview_dir)
}
