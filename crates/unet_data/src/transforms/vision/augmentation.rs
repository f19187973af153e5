use super::pair::ImageMaskPair;
use crate::dataloader::worker_gen_bool;
use crate::transforms::Transform;
use anyhow::{ensure, Result};

// ============================================================================
// RandomFlipPair
// ============================================================================

/// Randomly flips image and mask together, horizontally and/or vertically.
///
/// Each axis gets one draw per pair, so the mask always follows the image.
/// A probability of 0.0 disables that axis without consuming randomness.
///
/// # Example
/// ```ignore
/// let flip = RandomFlipPair::new(0.5, 0.5)?; // 50% chance per axis
/// let augmented = flip.apply(pair)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomFlipPair {
    horizontal_p: f64,
    vertical_p: f64,
}

impl RandomFlipPair {
    pub fn new(horizontal_p: f64, vertical_p: f64) -> Result<Self> {
        for p in [horizontal_p, vertical_p] {
            ensure!(
                (0.0..=1.0).contains(&p),
                "Probability must be in [0.0, 1.0] range (got {})",
                p
            );
        }
        Ok(Self {
            horizontal_p,
            vertical_p,
        })
    }

    /// 50% flips on the enabled axes.
    pub fn from_flags(horizontal: bool, vertical: bool) -> Self {
        let p = |enabled: bool| if enabled { 0.5 } else { 0.0 };
        Self {
            horizontal_p: p(horizontal),
            vertical_p: p(vertical),
        }
    }

    fn decide(p: f64) -> bool {
        match p {
            0.0 => false,
            1.0 => true,
            _ => worker_gen_bool(p),
        }
    }
}

impl Transform<ImageMaskPair, ImageMaskPair> for RandomFlipPair {
    fn apply(&self, pair: ImageMaskPair) -> Result<ImageMaskPair> {
        let ImageMaskPair {
            mut image,
            mut mask,
        } = pair;

        if Self::decide(self.horizontal_p) {
            image = image.fliph();
            mask = mask.fliph();
        }
        if Self::decide(self.vertical_p) {
            image = image.flipv();
            mask = mask.flipv();
        }
        Ok(ImageMaskPair { image, mask })
    }
}
