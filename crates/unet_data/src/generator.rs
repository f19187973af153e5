//! Endless batch generator over a `<dataset>/<folder>/{image,mask}` layout.
//!
//! ```text
//! PairedDirSource → LoadImagePair (color mode + resize)
//!                 → RandomAffinePair → RandomFlipPair → RandomCropPair
//!                 → PcaColorJitter (optional) → ToSample → StackCollator
//! ```
//!
//! # Example
//! ```ignore
//! let config = PipelineConfig::default();
//! let mut train = image_mask_generator(&config, "data", "train", true)?;
//! for _ in 0..config.schedule.train_steps {
//!     let batch = train.next().unwrap()?;
//!     // batch.images: [4, 1, 256, 256], batch.masks: [4, 2, 256, 256]
//! }
//! ```

use crate::config::{ColorMode, PipelineConfig};
use crate::dataloader::{DataLoader, DataLoaderConfig};
use crate::dataset::SegmentationDataset;
use crate::minibatch::MiniBatch;
use crate::readers::PairedDirSource;
use crate::transforms::vision::{
    AdjustMask, ImageMaskPair, LoadImagePair, PcaColorJitter, RandomAffinePair, RandomCropPair,
    RandomFlipPair, ToSample,
};
use crate::transforms::Compose;
use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;

/// Pair augmentation pipeline built from a config.
pub type PairPipeline = Compose<ImageMaskPair>;

/// Parses image and mask color mode names (`"L"` or `"RGB"`).
pub fn parse_color_modes(image: &str, mask: &str) -> Result<(ColorMode, ColorMode)> {
    let image_mode = image.parse().context("Invalid image colormode")?;
    let mask_mode = mask.parse().context("Invalid mask colormode")?;
    Ok((image_mode, mask_mode))
}

/// Augmentation steps between loading and tensor conversion.
///
/// Affine and flip steps are skipped when their settings are inactive; the
/// crop always runs (a crop to the full size is a no-op).
pub fn augmentation_pipeline(config: &PipelineConfig) -> Result<PairPipeline> {
    let augment = config.augment_or_default();
    let (sample_h, sample_w) = config.sample_size;

    Compose::new()
        .push_if(augment.has_affine(), || {
            Ok(RandomAffinePair::from_config(&augment))
        })?
        .push_if(augment.horizontal_flip || augment.vertical_flip, || {
            Ok(RandomFlipPair::from_flags(
                augment.horizontal_flip,
                augment.vertical_flip,
            ))
        })?
        .push(RandomCropPair::new(sample_h, sample_w)?)
        .push_if(config.pca_color, || {
            PcaColorJitter::new(config.pca_color_range, config.pca_color_std)
        })
}

/// Validates `config` and builds the dataset for `<dataset_dir>/<folder>`.
pub fn segmentation_dataset(
    config: &PipelineConfig,
    dataset_dir: impl AsRef<Path>,
    folder: &str,
) -> Result<SegmentationDataset<PairPipeline>> {
    config.validate().context("Invalid pipeline config")?;

    let source = PairedDirSource::new(dataset_dir, folder);
    let loader = LoadImagePair::new(
        config.image_color_mode,
        config.mask_color_mode,
        config.target_size,
        config.interpolation,
    )?;
    let to_sample = ToSample::new(
        config.augment_or_default().rescale,
        AdjustMask::from_config(config)?,
    )?;

    SegmentationDataset::from_source(&source, loader, augmentation_pipeline(config)?, to_sample)
        .with_context(|| format!("Failed to index folder '{}'", folder))
}

/// Builds an [`ImageMaskGenerator`] over `<dataset_dir>/<folder>`.
///
/// When `config.seed` is `None` a seed is drawn and logged so the run can be
/// reproduced.
pub fn image_mask_generator(
    config: &PipelineConfig,
    dataset_dir: impl AsRef<Path>,
    folder: &str,
    shuffle: bool,
) -> Result<ImageMaskGenerator> {
    let dataset = segmentation_dataset(config, dataset_dir, folder)?;

    let seed = match config.seed {
        Some(seed) => seed,
        None => {
            let seed: u64 = rand::rng().random();
            tracing::info!(seed, folder, "no seed configured, drew one");
            seed
        }
    };

    let loader_config = DataLoaderConfig::builder()
        .batch_size(config.batch_size)
        .shuffle(shuffle)
        .seed(seed)
        .drop_last(false)
        .build();
    let loader = DataLoader::new(dataset, loader_config)?;

    tracing::info!(
        folder,
        pairs = loader.dataset().len(),
        steps_per_epoch = loader.num_batches(),
        image_mode = %config.image_color_mode,
        mask_mode = %config.mask_color_mode,
        "image/mask generator ready"
    );

    Ok(ImageMaskGenerator {
        loader,
        pending: Vec::new().into_iter(),
    })
}

/// Endless iterator of augmented batches.
///
/// Walks the pairs epoch after epoch; with `shuffle` the order is redrawn at
/// each epoch boundary. The last batch of an epoch may be smaller than the
/// batch size. Each generator owns its augmentation RNG, reseeded at each
/// epoch boundary, so train and validation generators can be pulled in any
/// interleaving.
pub struct ImageMaskGenerator {
    loader: DataLoader<PairPipeline>,
    pending: std::vec::IntoIter<Vec<usize>>,
}

impl ImageMaskGenerator {
    /// Batches per pass over the data.
    pub fn steps_per_epoch(&self) -> usize {
        self.loader.num_batches()
    }

    /// The seed in effect.
    pub fn seed(&self) -> u64 {
        self.loader.seed()
    }

    /// Number of epochs started so far.
    pub fn epoch(&self) -> usize {
        self.loader.epochs_started()
    }

    pub fn len_pairs(&self) -> usize {
        self.loader.dataset().len()
    }

    pub fn loader(&self) -> &DataLoader<PairPipeline> {
        &self.loader
    }
}

impl Iterator for ImageMaskGenerator {
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.as_slice().is_empty() {
            self.pending = self.loader.begin_epoch().into_iter();
        }
        let indices = self.pending.next()?;
        Some(self.loader.fetch_batch(&indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
