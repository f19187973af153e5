use crate::sample::Sample;
use crate::transforms::vision::{ImageMaskPair, LoadImagePair, ToSample};
use crate::transforms::Transform;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// A `DataSource` lazily yields raw items (file paths, path pairs, ...).
pub trait DataSource<T>: Send + Sync {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>>;
}

/// Image/mask pairs on disk plus the pipeline turning one pair into a [`Sample`].
///
/// Files are decoded on every access, so each epoch sees fresh augmentation
/// and memory stays bounded by the batch size.
///
/// ```text
/// (image path, mask path) → LoadImagePair → augment (T) → ToSample → Sample
/// ```
///
/// # Type parameters
/// - `T`: pair augmentation pipeline, usually a [`crate::transforms::Compose`]
pub struct SegmentationDataset<T> {
    pairs: Vec<(PathBuf, PathBuf)>,
    loader: LoadImagePair,
    augment: T,
    to_sample: ToSample,
}

impl<T> SegmentationDataset<T>
where
    T: Transform<ImageMaskPair, ImageMaskPair>,
{
    pub fn new(
        pairs: Vec<(PathBuf, PathBuf)>,
        loader: LoadImagePair,
        augment: T,
        to_sample: ToSample,
    ) -> Self {
        Self {
            pairs,
            loader,
            augment,
            to_sample,
        }
    }

    /// Builds the dataset from any [`DataSource`] of path pairs.
    pub fn from_source(
        source: &impl DataSource<(PathBuf, PathBuf)>,
        loader: LoadImagePair,
        augment: T,
        to_sample: ToSample,
    ) -> Result<Self> {
        let pairs = source.stream()?.collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pairs, loader, augment, to_sample))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Paths of pair `index`.
    pub fn paths(&self, index: usize) -> Option<&(PathBuf, PathBuf)> {
        self.pairs.get(index)
    }

    fn paths_or_err(&self, index: usize) -> Result<&(PathBuf, PathBuf)> {
        self.pairs.get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of size {}",
                index,
                self.pairs.len()
            )
        })
    }

    /// Loads pair `index` and runs the augmentation pipeline, stopping
    /// before tensor conversion.
    pub fn augmented_pair(&self, index: usize) -> Result<ImageMaskPair> {
        let (image_path, mask_path) = self.paths_or_err(index)?;
        let pair = self.loader.apply((image_path.clone(), mask_path.clone()))?;
        self.augment
            .apply(pair)
            .with_context(|| format!("Failed to augment {}", image_path.display()))
    }

    /// Loads, augments and converts pair `index`.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let pair = self.augmented_pair(index)?;
        self.to_sample.apply(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorMode, Interpolation};
    use crate::transforms::vision::AdjustMask;
    use crate::transforms::Compose;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    struct FixedPairs(Vec<(PathBuf, PathBuf)>);

    impl DataSource<(PathBuf, PathBuf)> for FixedPairs {
        fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<(PathBuf, PathBuf)>> + Send>> {
            Ok(Box::new(self.0.clone().into_iter().map(Ok)))
        }
    }

    #[test]
    fn test_get_loads_and_converts() -> Result<()> {
        let dir = tempdir()?;
        let image_path = dir.path().join("img.png");
        let mask_path = dir.path().join("mask.png");
        GrayImage::from_pixel(8, 8, Luma([100])).save(&image_path)?;
        GrayImage::from_pixel(8, 8, Luma([255])).save(&mask_path)?;

        let dataset = SegmentationDataset::from_source(
            &FixedPairs(vec![(image_path, mask_path)]),
            LoadImagePair::new(ColorMode::L, ColorMode::L, (4, 4), Interpolation::Nearest)?,
            Compose::new(),
            ToSample::new(1.0 / 255.0, AdjustMask::new(ColorMode::L, vec![0], None)?)?,
        )?;

        assert_eq!(dataset.len(), 1);
        let sample = dataset.get(0)?;
        assert_eq!(sample.image.size(), vec![1, 4, 4]);
        assert_eq!(sample.mask.size(), vec![1, 4, 4]);
        assert_eq!(sample.mask.double_value(&[0, 2, 2]), 1.0);

        assert!(dataset.get(1).is_err());
        Ok(())
    }
}
