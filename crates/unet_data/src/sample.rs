use anyhow::{ensure, Context, Result};
use tch::Tensor;

/// A single training example: an image and its segmentation mask.
///
/// - `image`: `[C, H, W]` float tensor (C = 1 for grayscale, 3 for RGB)
/// - `mask`: `[K, H, W]` float tensor holding one binary plane per class
///
/// Both tensors always share the same spatial size; [`Sample::new`] refuses
/// anything else so a misaligned pair cannot reach a batch.
#[derive(Debug)]
pub struct Sample {
    pub image: Tensor,
    pub mask: Tensor,
}

/// Creates a shallow clone of the `Sample` (tensor storage is shared).
impl Clone for Sample {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            mask: self.mask.shallow_clone(),
        }
    }
}

impl Sample {
    pub fn new(image: Tensor, mask: Tensor) -> Result<Self> {
        let (_, image_h, image_w) = image
            .size3()
            .context("Sample image must be a 3D tensor [C, H, W]")?;
        let (_, mask_h, mask_w) = mask
            .size3()
            .context("Sample mask must be a 3D tensor [K, H, W]")?;
        ensure!(
            image_h == mask_h && image_w == mask_w,
            "Image ({}x{}) and mask ({}x{}) spatial sizes differ",
            image_h,
            image_w,
            mask_h,
            mask_w
        );
        Ok(Self { image, mask })
    }

    /// `(height, width)` shared by image and mask.
    pub fn spatial_size(&self) -> (i64, i64) {
        let size = self.image.size();
        (size[1], size[2])
    }

    pub fn image_channels(&self) -> i64 {
        self.image.size()[0]
    }

    pub fn mask_channels(&self) -> i64 {
        self.mask.size()[0]
    }
}

#[cfg(test)]
mod sample_test {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_sample_construction() -> Result<()> {
        let image = Tensor::zeros([1, 8, 6], (Kind::Float, Device::Cpu));
        let mask = Tensor::ones([2, 8, 6], (Kind::Float, Device::Cpu));
        let sample = Sample::new(image, mask)?;

        assert_eq!(sample.spatial_size(), (8, 6));
        assert_eq!(sample.image_channels(), 1);
        assert_eq!(sample.mask_channels(), 2);

        let copy = sample.clone();
        assert!(copy.mask.equal(&sample.mask));
        Ok(())
    }

    #[test]
    fn test_sample_rejects_misaligned_pair() {
        let image = Tensor::zeros([3, 8, 8], (Kind::Float, Device::Cpu));
        let mask = Tensor::zeros([1, 8, 7], (Kind::Float, Device::Cpu));
        assert!(Sample::new(image, mask).is_err());

        let flat = Tensor::zeros([64], (Kind::Float, Device::Cpu));
        let mask = Tensor::zeros([1, 8, 8], (Kind::Float, Device::Cpu));
        assert!(Sample::new(flat, mask).is_err());
    }
}
