//! src/dataloader/loader.rs
//!
//! `DataLoader` for [`SegmentationDataset`]s.
//!
//! The loader picks its sampler from `config.shuffle`:
//! - `shuffle = false`: SequentialSampler, same order every epoch.
//! - `shuffle = true`: RandomSampler seeded with the runtime seed.
//!
//! # Seed Coordination
//!
//! A single runtime seed drives all randomness. The sampler shuffles with
//! `seed + epoch` and, at the start of every epoch, the loader's own
//! augmentation RNG is reset with `seed + (epoch << 32)`. The same seed
//! therefore reproduces both the batch composition and the augmented pixels,
//! regardless of other loaders pulled on the same thread.

use crate::collator::{Collator, StackCollator};
use crate::dataset::SegmentationDataset;
use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use crate::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use crate::transforms::vision::ImageMaskPair;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::common::thread::{with_scoped_rng, worker_rng};
use super::config::DataLoaderConfig;

// ================================================================================================
// 1. Core Types
// ================================================================================================

type IndexSampler = Box<dyn Sampler<Item = usize> + Send + Sync>;

/// Batches a [`SegmentationDataset`] epoch by epoch.
///
/// # Thread safety:
/// - `DataLoader` is Send + Sync and can be shared across threads.
/// - Each loader owns its augmentation RNG; it is installed in the thread-local
///   slot only while a batch is fetched. Concurrent fetches on one loader are
///   serialized.
///
/// # Type parameters:
/// - `T`: pair augmentation pipeline of the dataset
/// - `C`: Collator type (defaults to StackCollator)
pub struct DataLoader<T, C = StackCollator> {
    dataset: SegmentationDataset<T>,
    collator: C,
    config: DataLoaderConfig,
    batch_sampler: BatchSampler<IndexSampler>,
    current_epoch: AtomicUsize,
    runtime_seed: u64,
    rng: Mutex<StdRng>,
}

// ================================================================================================
// 2. Constructors
// ================================================================================================
impl<T> DataLoader<T, StackCollator>
where
    T: Transform<ImageMaskPair, ImageMaskPair>,
{
    /// Creates a DataLoader with the default [`StackCollator`].
    ///
    /// # Example
    /// ```ignore
    /// let config = DataLoaderConfig::builder()
    ///     .batch_size(4)
    ///     .shuffle(true)
    ///     .seed(42)
    ///     .build();
    /// let dataloader = DataLoader::new(dataset, config)?;
    /// ```
    pub fn new(dataset: SegmentationDataset<T>, config: DataLoaderConfig) -> Result<Self> {
        Self::new_with_collator(dataset, config, StackCollator)
    }
}

impl<T, C> DataLoader<T, C>
where
    T: Transform<ImageMaskPair, ImageMaskPair>,
    C: Collator,
{
    /// Creates a DataLoader with a custom collator.
    ///
    /// # Errors
    /// - `batch_size` is 0
    /// - the dataset is empty
    pub fn new_with_collator(
        dataset: SegmentationDataset<T>,
        mut config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        let batch_size = config.batch_size.unwrap_or(1);
        let drop_last = config.drop_last.unwrap_or(false);
        let shuffle = config.shuffle.unwrap_or(false);
        config.batch_size = Some(batch_size);
        config.drop_last = Some(drop_last);
        config.shuffle = Some(shuffle);

        ensure!(batch_size > 0, "Batch size must be greater than 0");
        ensure!(!dataset.is_empty(), "Cannot load batches from an empty dataset");

        let runtime_seed = config.seed.unwrap_or_else(|| rand::rng().random());

        let sampler: IndexSampler = if shuffle {
            Box::new(RandomSampler::new(dataset.len(), runtime_seed)?)
        } else {
            Box::new(SequentialSampler::new(dataset.len()))
        };
        let batch_sampler = BatchSampler::new(sampler, batch_size, drop_last)
            .context("Failed to wrap sampler with BatchSampler")?;

        Ok(Self {
            dataset,
            collator,
            config,
            batch_sampler,
            current_epoch: AtomicUsize::new(0),
            runtime_seed,
            rng: Mutex::new(worker_rng(0, 0, runtime_seed)),
        })
    }

    // ============================================================================================
    // 3. Accessors
    // ============================================================================================

    pub fn dataset(&self) -> &SegmentationDataset<T> {
        &self.dataset
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// The seed in effect, including one drawn at construction time.
    pub fn seed(&self) -> u64 {
        self.runtime_seed
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size.unwrap_or(1)
    }

    /// Number of epochs started so far.
    pub fn epochs_started(&self) -> usize {
        self.current_epoch.load(Ordering::SeqCst)
    }

    /// Number of batches in one epoch.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        let batch_size = self.batch_size();
        if self.config.drop_last.unwrap_or(false) {
            n / batch_size
        } else {
            n.div_ceil(batch_size)
        }
    }

    // ============================================================================================
    // 4. Iteration
    // ============================================================================================

    /// Starts the next epoch: advances the epoch counter, reseeds the
    /// loader's augmentation RNG and returns the epoch's batch indices.
    pub fn begin_epoch(&self) -> Vec<Vec<usize>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        let sampler_epoch = if self.config.shuffle.unwrap_or(false) {
            epoch
        } else {
            0
        };

        *self.lock_rng() = worker_rng(0, epoch, self.runtime_seed);
        let batches: Vec<Vec<usize>> = self.batch_sampler.iter(sampler_epoch).collect();
        tracing::debug!(epoch, batches = batches.len(), "starting epoch");
        batches
    }

    /// Loads, augments and collates the pairs at `indices`.
    pub fn fetch_batch(&self, indices: &[usize]) -> Result<MiniBatch> {
        let mut rng = self.lock_rng();
        let samples = with_scoped_rng(&mut rng, || {
            indices
                .iter()
                .map(|&i| {
                    self.dataset.get(i).with_context(|| {
                        let path = self
                            .dataset
                            .paths(i)
                            .map(|(image, _)| image.display().to_string())
                            .unwrap_or_default();
                        format!("Failed to load pair {} ({})", i, path)
                    })
                })
                .collect::<Result<Vec<Sample>>>()
        })?;
        drop(rng);
        self.collator.collate(&samples)
    }

    // A panic inside a transform only leaves a partially advanced RNG behind.
    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Iterator over the batches of the next epoch.
    ///
    /// If `shuffle` is true every call yields a different order.
    pub fn iter(&self) -> DataLoaderIter<'_, T, C> {
        DataLoaderIter {
            batches: self.begin_epoch().into_iter(),
            loader: self,
        }
    }
}

/// Iterator over one epoch of a [`DataLoader`].
pub struct DataLoaderIter<'a, T, C> {
    loader: &'a DataLoader<T, C>,
    batches: std::vec::IntoIter<Vec<usize>>,
}

impl<T, C> Iterator for DataLoaderIter<'_, T, C>
where
    T: Transform<ImageMaskPair, ImageMaskPair>,
    C: Collator,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.batches.next()?;
        Some(self.loader.fetch_batch(&indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.batches.size_hint()
    }
}

impl<T, C> ExactSizeIterator for DataLoaderIter<'_, T, C>
where
    T: Transform<ImageMaskPair, ImageMaskPair>,
    C: Collator,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorMode, Interpolation};
    use crate::dataloader::DataLoaderConfig;
    use crate::transforms::vision::{AdjustMask, LoadImagePair, RandomCropPair, ToSample};
    use crate::transforms::Compose;
    use image::{GrayImage, Luma};
    use std::path::PathBuf;
    use tch::Tensor;
    use tempfile::{tempdir, TempDir};

    /// `n` 8x8 pairs; image `i` is filled with value `i * 10`.
    fn make_dataset(n: usize) -> Result<(TempDir, SegmentationDataset<Compose<ImageMaskPair>>)> {
        let dir = tempdir()?;
        let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::new();
        for i in 0..n {
            let image = dir.path().join(format!("img{i}.png"));
            let mask = dir.path().join(format!("mask{i}.png"));
            GrayImage::from_pixel(8, 8, Luma([(i * 10) as u8])).save(&image)?;
            GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 255 } else { 0 }])).save(&mask)?;
            pairs.push((image, mask));
        }
        let dataset = SegmentationDataset::new(
            pairs,
            LoadImagePair::new(ColorMode::L, ColorMode::L, (8, 8), Interpolation::Nearest)?,
            Compose::new().push(RandomCropPair::new(4, 4)?),
            ToSample::new(1.0, AdjustMask::new(ColorMode::L, vec![0], None)?)?,
        );
        Ok((dir, dataset))
    }

    /// First pixel of every image in the batch, i.e. the pair's fill value.
    fn fill_values(batch: &MiniBatch) -> Vec<i64> {
        (0..batch.batch_size())
            .map(|i| batch.images.double_value(&[i, 0, 0, 0]) as i64)
            .collect()
    }

    #[test]
    fn test_batches_cover_dataset_with_partial_tail() -> Result<()> {
        let (_dir, dataset) = make_dataset(5)?;
        let loader = DataLoader::new(dataset, DataLoaderConfig::builder().batch_size(2).build())?;
        assert_eq!(loader.num_batches(), 3);

        let batches = loader.iter().collect::<Result<Vec<_>>>()?;
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].images.size(), vec![2, 1, 4, 4]);
        assert_eq!(batches[2].images.size(), vec![1, 1, 4, 4]);
        assert_eq!(fill_values(&batches[0]), vec![0, 10]);
        assert_eq!(fill_values(&batches[2]), vec![40]);
        Ok(())
    }

    #[test]
    fn test_drop_last() -> Result<()> {
        let (_dir, dataset) = make_dataset(5)?;
        let config = DataLoaderConfig::builder().batch_size(2).drop_last(true).build();
        let loader = DataLoader::new(dataset, config)?;
        assert_eq!(loader.num_batches(), 2);
        assert_eq!(loader.iter().count(), 2);
        Ok(())
    }

    #[test]
    fn test_shuffle_reproducible_with_seed() -> Result<()> {
        let config = || {
            DataLoaderConfig::builder()
                .batch_size(3)
                .shuffle(true)
                .seed(1234)
                .build()
        };
        let (_d1, first) = make_dataset(6)?;
        let (_d2, second) = make_dataset(6)?;
        let a = DataLoader::new(first, config())?;
        let b = DataLoader::new(second, config())?;

        for _epoch in 0..2 {
            let order_a: Vec<i64> = a
                .iter()
                .map(|batch| batch.map(|b| fill_values(&b)))
                .collect::<Result<Vec<_>>>()?
                .concat();
            let order_b: Vec<i64> = b
                .iter()
                .map(|batch| batch.map(|b| fill_values(&b)))
                .collect::<Result<Vec<_>>>()?
                .concat();
            assert_eq!(order_a, order_b);

            let mut sorted = order_a.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 10, 20, 30, 40, 50]);
        }
        assert_eq!(a.epochs_started(), 2);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_crops() -> Result<()> {
        let config = || DataLoaderConfig::builder().batch_size(2).seed(5).build();
        let (_d1, first) = make_dataset(2)?;
        let (_d2, second) = make_dataset(2)?;
        let a = DataLoader::new(first, config())?;
        let b = DataLoader::new(second, config())?;

        let mask_a = a.iter().next().unwrap()?.masks;
        let mask_b = b.iter().next().unwrap()?.masks;
        assert!(mask_a.equal(&mask_b));
        Ok(())
    }

    #[test]
    fn test_interleaved_loaders_keep_their_own_crops() -> Result<()> {
        let config = |seed| DataLoaderConfig::builder().batch_size(1).seed(seed).build();
        let (_d1, solo_data) = make_dataset(1)?;
        let (_d2, first_data) = make_dataset(1)?;
        let (_d3, other_data) = make_dataset(1)?;

        let solo = DataLoader::new(solo_data, config(7))?;
        let expected: Vec<Tensor> = (0..4)
            .map(|_| solo.fetch_batch(&[0]).map(|b| b.masks))
            .collect::<Result<_>>()?;

        let first = DataLoader::new(first_data, config(7))?;
        let other = DataLoader::new(other_data, config(8))?;
        first.begin_epoch();
        other.begin_epoch();
        for mask in &expected {
            other.begin_epoch();
            other.fetch_batch(&[0])?;
            assert!(first.fetch_batch(&[0])?.masks.equal(mask));
        }
        Ok(())
    }

    #[test]
    fn test_rejects_zero_batch_size_and_empty_dataset() -> Result<()> {
        let (_dir, dataset) = make_dataset(2)?;
        let zero_batch = DataLoaderConfig::builder().batch_size(0).build();
        assert!(DataLoader::new(dataset, zero_batch).is_err());

        let (_dir, empty) = make_dataset(0)?;
        assert!(DataLoader::new(empty, DataLoaderConfig::default()).is_err());
        Ok(())
    }
}
