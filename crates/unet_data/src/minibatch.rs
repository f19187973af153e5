use crate::collator::Collator;
use crate::sample::Sample;
use anyhow::Result;
use tch::{Device, Tensor};

/// A batch of image/mask pairs ready for the training loop.
///
/// - `images`: `[N, C, H, W]`
/// - `masks`: `[N, K, H, W]`
///
/// Row `i` of `masks` always labels row `i` of `images`.
#[derive(Debug)]
pub struct MiniBatch {
    pub images: Tensor,
    pub masks: Tensor,
}

impl MiniBatch {
    /// Constructs a `MiniBatch` by applying the given [`Collator`] to a
    /// list of individual [`Sample`]s.
    pub fn collate(samples: Vec<Sample>, collator: impl Collator) -> Result<Self> {
        collator.collate(&samples)
    }

    /// Returns the number of pairs in the batch.
    pub fn batch_size(&self) -> i64 {
        self.images.size()[0]
    }

    /// Returns `(images, masks)` permuted to `[N, H, W, C]`, the layout
    /// channels-last frameworks expect.
    pub fn channels_last(&self) -> (Tensor, Tensor) {
        (
            self.images.permute([0, 2, 3, 1]).contiguous(),
            self.masks.permute([0, 2, 3, 1]).contiguous(),
        )
    }

    /// Transfers both tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            images: self.images.to_device(device),
            masks: self.masks.to_device(device),
        }
    }
}
