use super::pair::{convert_color_mode, ImageMaskPair};
use crate::config::{ColorMode, Interpolation};
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

// ============================================================================
// LoadImagePair
// ============================================================================

/// Loads an image file and its mask file into an aligned [`ImageMaskPair`].
///
/// Each file is decoded, converted to its configured color mode and resized
/// to `target_size` (`(height, width)`). The image uses the configured filter;
/// the mask always uses nearest neighbour so no new label colors appear.
///
/// # Input/Output
/// - **Input**: `(PathBuf, PathBuf)` - image path, mask path
/// - **Output**: `ImageMaskPair` - both sides at `target_size`
///
/// # Example
/// ```ignore
/// let loader =
///     LoadImagePair::new(ColorMode::L, ColorMode::Rgb, (256, 256), Interpolation::Nearest)?;
/// let pair = loader.apply((image_path, mask_path))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImagePair {
    image_mode: ColorMode,
    mask_mode: ColorMode,
    target_size: (u32, u32),
    filter: FilterType,
    buffer_size: usize,
}

impl LoadImagePair {
    pub fn new(
        image_mode: ColorMode,
        mask_mode: ColorMode,
        target_size: (u32, u32),
        interpolation: Interpolation,
    ) -> Result<Self> {
        let (height, width) = target_size;
        ensure!(
            width > 0 && height > 0,
            "Target size must be positive (got {}x{})",
            height,
            width
        );
        Ok(Self {
            image_mode,
            mask_mode,
            target_size,
            filter: interpolation.filter_type(),
            buffer_size: 8192,
        })
    }

    /// Decodes any format the `image` crate recognizes, guessing from content.
    pub fn decode(&self, path: &Path) -> Result<DynamicImage> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;

        let file_size = file.metadata()?.len() as usize;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }

    fn resize(&self, img: DynamicImage, filter: FilterType) -> DynamicImage {
        let (height, width) = self.target_size;
        if img.dimensions() == (width, height) {
            img
        } else {
            img.resize_exact(width, height, filter)
        }
    }
}

impl Transform<(PathBuf, PathBuf), ImageMaskPair> for LoadImagePair {
    fn apply(&self, (image_path, mask_path): (PathBuf, PathBuf)) -> Result<ImageMaskPair> {
        let image = convert_color_mode(self.decode(&image_path)?, self.image_mode);
        let mask = convert_color_mode(self.decode(&mask_path)?, self.mask_mode);

        ImageMaskPair::new(
            self.resize(image, self.filter),
            self.resize(mask, FilterType::Nearest),
        )
        .with_context(|| {
            format!(
                "Failed to pair {} with {}",
                image_path.display(),
                mask_path.display()
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_rgb(path: &Path, width: u32, height: u32, color: [u8; 3]) -> Result<()> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        img.save(path)?;
        Ok(())
    }

    #[test]
    fn test_load_pair_converts_and_resizes() -> Result<()> {
        let dir = tempdir()?;
        let image_path = dir.path().join("a.png");
        let mask_path = dir.path().join("a_mask.png");
        write_rgb(&image_path, 10, 6, [200, 100, 50])?;
        write_rgb(&mask_path, 20, 12, [255, 0, 255])?;

        let loader =
            LoadImagePair::new(ColorMode::L, ColorMode::Rgb, (8, 16), Interpolation::Nearest)?;
        let pair = loader.apply((image_path, mask_path))?;

        assert_eq!(pair.dimensions(), (16, 8));
        assert!(matches!(pair.image, DynamicImage::ImageLuma8(_)));
        assert!(matches!(pair.mask, DynamicImage::ImageRgb8(_)));
        // Nearest neighbour keeps the exact label color.
        assert_eq!(pair.mask.to_rgb8().get_pixel(3, 3), &Rgb([255, 0, 255]));
        Ok(())
    }

    #[test]
    fn test_load_pair_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let image_path = dir.path().join("a.png");
        write_rgb(&image_path, 4, 4, [0, 0, 0])?;

        let loader =
            LoadImagePair::new(ColorMode::Rgb, ColorMode::L, (4, 4), Interpolation::Bilinear)?;
        let result = loader.apply((image_path, dir.path().join("missing.png")));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(
            LoadImagePair::new(ColorMode::L, ColorMode::L, (0, 4), Interpolation::Nearest).is_err()
        );
    }
}
