use crate::config::ColorMode;
use anyhow::{ensure, Result};
use image::{DynamicImage, GenericImageView};

/// An image and its label mask, decoded and spatially aligned.
#[derive(Debug, Clone)]
pub struct ImageMaskPair {
    pub image: DynamicImage,
    pub mask: DynamicImage,
}

impl ImageMaskPair {
    /// Creates a pair, rejecting image and mask of different sizes.
    pub fn new(image: DynamicImage, mask: DynamicImage) -> Result<Self> {
        ensure!(
            image.dimensions() == mask.dimensions(),
            "Image ({:?}) and mask ({:?}) dimensions differ",
            image.dimensions(),
            mask.dimensions()
        );
        Ok(Self { image, mask })
    }

    /// `(width, height)` shared by image and mask.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Converts `img` to the 8-bit layout of `mode` (`Luma8` or `Rgb8`).
pub fn convert_color_mode(img: DynamicImage, mode: ColorMode) -> DynamicImage {
    match (mode, img) {
        (ColorMode::L, img @ DynamicImage::ImageLuma8(_)) => img,
        (ColorMode::Rgb, img @ DynamicImage::ImageRgb8(_)) => img,
        (ColorMode::L, img) => DynamicImage::ImageLuma8(img.to_luma8()),
        (ColorMode::Rgb, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}
