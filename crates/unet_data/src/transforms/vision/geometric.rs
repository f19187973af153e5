use super::pair::ImageMaskPair;
use crate::config::AugmentConfig;
use crate::dataloader::worker_gen_range;
use crate::transforms::Transform;
use anyhow::{anyhow, bail, ensure, Result};
use image::{DynamicImage, GenericImageView, Luma, Rgb};
use imageproc::geometric_transformations::{warp, Interpolation as WarpInterpolation, Projection};

// ============================================================================
// RandomCropPair
// ============================================================================

/// Crops the same randomly placed `height x width` window out of image and mask.
///
/// The top-left offset is drawn uniformly from `0..=h - height` and
/// `0..=w - width`, so the window always fits. When the pair is exactly the
/// window size the crop is the identity.
///
/// # Example
/// ```ignore
/// let crop = RandomCropPair::new(256, 256)?;
/// let cropped = crop.apply(pair)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomCropPair {
    height: u32,
    width: u32,
}

impl RandomCropPair {
    pub fn new(height: u32, width: u32) -> Result<Self> {
        ensure!(
            height > 0 && width > 0,
            "Crop size must be positive (got {}x{})",
            height,
            width
        );
        Ok(Self { height, width })
    }

    /// Crops both sides at a fixed `(top, left)` offset.
    pub fn crop_at(&self, pair: ImageMaskPair, top: u32, left: u32) -> Result<ImageMaskPair> {
        let (width, height) = pair.image.dimensions();
        ensure!(
            pair.mask.dimensions() == (width, height),
            "Image ({}x{}) and mask ({:?}) must share dimensions before cropping",
            width,
            height,
            pair.mask.dimensions()
        );
        ensure!(
            top.checked_add(self.height).is_some_and(|bottom| bottom <= height)
                && left.checked_add(self.width).is_some_and(|right| right <= width),
            "Crop window {}x{} at ({}, {}) exceeds image bounds {}x{}",
            self.height,
            self.width,
            top,
            left,
            height,
            width
        );

        Ok(ImageMaskPair {
            image: pair.image.crop_imm(left, top, self.width, self.height),
            mask: pair.mask.crop_imm(left, top, self.width, self.height),
        })
    }
}

impl Transform<ImageMaskPair, ImageMaskPair> for RandomCropPair {
    fn apply(&self, pair: ImageMaskPair) -> Result<ImageMaskPair> {
        let (width, height) = pair.image.dimensions();
        ensure!(
            self.height <= height && self.width <= width,
            "Crop size {}x{} is larger than the image {}x{}",
            self.height,
            self.width,
            height,
            width
        );

        let top = worker_gen_range(0..=height - self.height);
        let left = worker_gen_range(0..=width - self.width);
        self.crop_at(pair, top, left)
    }
}

// ============================================================================
// RandomAffinePair
// ============================================================================

/// One draw of affine augmentation parameters.
///
/// `rotation` and `shear` are in degrees, shifts in pixels, zoom is a scale
/// factor on the sampling grid (> 1 shows more of the scene).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParams {
    pub rotation: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    pub shear: f32,
    pub zoom_x: f32,
    pub zoom_y: f32,
}

impl AffineParams {
    pub fn identity() -> Self {
        Self {
            rotation: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            shear: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Matrix mapping an output pixel to the input pixel it samples,
    /// centred on the image centre.
    fn sampling_matrix(&self, width: u32, height: u32) -> [f32; 9] {
        let (sin_r, cos_r) = self.rotation.to_radians().sin_cos();
        let (sin_s, cos_s) = self.shear.to_radians().sin_cos();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;

        let rotation = [cos_r, -sin_r, 0.0, sin_r, cos_r, 0.0, 0.0, 0.0, 1.0];
        let shift = [1.0, 0.0, self.shift_x, 0.0, 1.0, self.shift_y, 0.0, 0.0, 1.0];
        let shear = [1.0, -sin_s, 0.0, 0.0, cos_s, 0.0, 0.0, 0.0, 1.0];
        let zoom = [self.zoom_x, 0.0, 0.0, 0.0, self.zoom_y, 0.0, 0.0, 0.0, 1.0];
        let to_centre = [1.0, 0.0, cx, 0.0, 1.0, cy, 0.0, 0.0, 1.0];
        let from_centre = [1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0];

        [rotation, shift, shear, zoom, from_centre]
            .iter()
            .fold(to_centre, |acc, m| mat_mul(&acc, m))
    }

    /// Projection taking input pixels to output pixels, as `warp` expects.
    pub fn projection(&self, width: u32, height: u32) -> Result<Projection> {
        Projection::from_matrix(self.sampling_matrix(width, height))
            .map(Projection::invert)
            .ok_or_else(|| anyhow!("Degenerate affine parameters: {:?}", self))
    }
}

fn mat_mul(a: &[f32; 9], b: &[f32; 9]) -> [f32; 9] {
    let mut out = [0.0; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = (0..3).map(|k| a[row * 3 + k] * b[k * 3 + col]).sum();
        }
    }
    out
}

fn warp_dynamic(
    img: &DynamicImage,
    projection: &Projection,
    interpolation: WarpInterpolation,
    cval: u8,
) -> Result<DynamicImage> {
    Ok(match img {
        DynamicImage::ImageLuma8(buf) => {
            DynamicImage::ImageLuma8(warp(buf, projection, interpolation, Luma([cval])))
        }
        DynamicImage::ImageRgb8(buf) => {
            DynamicImage::ImageRgb8(warp(buf, projection, interpolation, Rgb([cval; 3])))
        }
        other => bail!("Unsupported pixel layout for affine warp: {:?}", other.color()),
    })
}

/// Random rotation, shift, shear and zoom about the image centre, applied
/// with one parameter draw to both image and mask.
///
/// The image is sampled bilinearly, the mask with nearest neighbour. Pixels
/// whose source lies outside the image are filled with `cval`.
#[derive(Debug, Clone)]
pub struct RandomAffinePair {
    rotation_range: f32,
    width_shift_range: f32,
    height_shift_range: f32,
    shear_range: f32,
    zoom_range: f32,
    cval: u8,
}

impl RandomAffinePair {
    pub fn from_config(config: &AugmentConfig) -> Self {
        Self {
            rotation_range: config.rotation_range,
            width_shift_range: config.width_shift_range,
            height_shift_range: config.height_shift_range,
            shear_range: config.shear_range,
            zoom_range: config.zoom_range,
            cval: config.cval,
        }
    }

    fn symmetric(range: f32) -> f32 {
        if range > 0.0 {
            worker_gen_range(-range..=range)
        } else {
            0.0
        }
    }

    /// Draws parameters for a `width x height` pair.
    pub fn sample_params(&self, width: u32, height: u32) -> AffineParams {
        let rotation = Self::symmetric(self.rotation_range);
        let shift_x = Self::symmetric(self.width_shift_range) * width as f32;
        let shift_y = Self::symmetric(self.height_shift_range) * height as f32;
        let shear = Self::symmetric(self.shear_range);
        let (zoom_x, zoom_y) = if self.zoom_range > 0.0 {
            let zoom = 1.0 - self.zoom_range..=1.0 + self.zoom_range;
            (worker_gen_range(zoom.clone()), worker_gen_range(zoom))
        } else {
            (1.0, 1.0)
        };

        AffineParams {
            rotation,
            shift_x,
            shift_y,
            shear,
            zoom_x,
            zoom_y,
        }
    }

    /// Applies fixed parameters to both sides of the pair.
    pub fn apply_params(
        &self,
        pair: ImageMaskPair,
        params: &AffineParams,
    ) -> Result<ImageMaskPair> {
        if params.is_identity() {
            return Ok(pair);
        }
        let (width, height) = pair.dimensions();
        let projection = params.projection(width, height)?;

        ImageMaskPair::new(
            warp_dynamic(&pair.image, &projection, WarpInterpolation::Bilinear, self.cval)?,
            warp_dynamic(&pair.mask, &projection, WarpInterpolation::Nearest, self.cval)?,
        )
    }
}

impl Transform<ImageMaskPair, ImageMaskPair> for RandomAffinePair {
    fn apply(&self, pair: ImageMaskPair) -> Result<ImageMaskPair> {
        let (width, height) = pair.dimensions();
        let params = self.sample_params(width, height);
        self.apply_params(pair, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::init_worker_rng;
    use image::{GrayImage, RgbImage};

    /// Gray image whose pixel value encodes its position; mask mirrors it in red.
    fn coordinate_pair(width: u32, height: u32) -> ImageMaskPair {
        let image = GrayImage::from_fn(width, height, |x, y| Luma([(y * width + x) as u8]));
        let mask = RgbImage::from_fn(width, height, |x, y| Rgb([(y * width + x) as u8, 0, 0]));
        ImageMaskPair::new(DynamicImage::ImageLuma8(image), DynamicImage::ImageRgb8(mask)).unwrap()
    }

    fn assert_aligned(pair: &ImageMaskPair) {
        let image = pair.image.to_luma8();
        let mask = pair.mask.to_rgb8();
        for (x, y, pixel) in image.enumerate_pixels() {
            assert_eq!(pixel[0], mask.get_pixel(x, y)[0], "misaligned at ({}, {})", x, y);
        }
    }

    #[test]
    fn test_crop_keeps_pair_aligned() -> Result<()> {
        init_worker_rng(0, 0, 7);
        let crop = RandomCropPair::new(4, 5)?;
        for _ in 0..20 {
            let cropped = crop.apply(coordinate_pair(12, 10))?;
            assert_eq!(cropped.dimensions(), (5, 4));
            assert_eq!(cropped.mask.dimensions(), (5, 4));
            assert_aligned(&cropped);
        }
        Ok(())
    }

    #[test]
    fn test_crop_at_offset() -> Result<()> {
        let crop = RandomCropPair::new(2, 3)?;
        let cropped = crop.crop_at(coordinate_pair(8, 8), 1, 2)?;
        // top-left of the window is (x=2, y=1) -> 1 * 8 + 2
        assert_eq!(cropped.image.to_luma8().get_pixel(0, 0)[0], 10);
        assert!(crop.crop_at(coordinate_pair(8, 8), 7, 0).is_err());
        assert!(crop.crop_at(coordinate_pair(8, 8), u32::MAX, 0).is_err());
        assert!(crop.crop_at(coordinate_pair(8, 8), 0, u32::MAX - 1).is_err());
        Ok(())
    }

    #[test]
    fn test_crop_full_size_is_identity() -> Result<()> {
        let pair = coordinate_pair(6, 6);
        let cropped = RandomCropPair::new(6, 6)?.apply(pair.clone())?;
        assert_eq!(cropped.image.as_bytes(), pair.image.as_bytes());
        Ok(())
    }

    #[test]
    fn test_crop_larger_than_image_fails() -> Result<()> {
        let crop = RandomCropPair::new(16, 16)?;
        assert!(crop.apply(coordinate_pair(8, 8)).is_err());
        assert!(RandomCropPair::new(0, 4).is_err());
        Ok(())
    }

    #[test]
    fn test_crop_is_reproducible_with_seed() -> Result<()> {
        let crop = RandomCropPair::new(3, 3)?;
        init_worker_rng(0, 2, 99);
        let first = crop.apply(coordinate_pair(16, 16))?;
        init_worker_rng(0, 2, 99);
        let second = crop.apply(coordinate_pair(16, 16))?;
        assert_eq!(first.image.as_bytes(), second.image.as_bytes());
        Ok(())
    }

    #[test]
    fn test_identity_params_leave_pair_untouched() -> Result<()> {
        let affine = RandomAffinePair::from_config(&AugmentConfig::rescale_only());
        let pair = coordinate_pair(8, 8);
        let params = affine.sample_params(8, 8);
        assert!(params.is_identity());
        let out = affine.apply_params(pair.clone(), &params)?;
        assert_eq!(out.image.as_bytes(), pair.image.as_bytes());
        Ok(())
    }

    #[test]
    fn test_shift_moves_image_and_mask_together() -> Result<()> {
        let affine = RandomAffinePair::from_config(&AugmentConfig::rescale_only());
        let params = AffineParams {
            shift_x: 2.0,
            ..AffineParams::identity()
        };
        let out = affine.apply_params(coordinate_pair(8, 8), &params)?;

        let image = out.image.to_luma8();
        let mask = out.mask.to_rgb8();

        // Output pixel (x, y) samples input pixel (x + 2, y).
        assert_eq!(mask.get_pixel(1, 1)[0], 11);
        for y in 1..7 {
            for x in 1..5 {
                let diff = image.get_pixel(x, y)[0] as i32 - mask.get_pixel(x, y)[0] as i32;
                assert!(diff.abs() <= 1, "image and mask diverge at ({}, {})", x, y);
            }
        }
        // The right-most column has no source and takes cval.
        assert_eq!(mask.get_pixel(7, 3)[0], 0);
        Ok(())
    }

    #[test]
    fn test_random_affine_keeps_mask_labels() -> Result<()> {
        init_worker_rng(0, 0, 3);
        let affine = RandomAffinePair::from_config(&AugmentConfig::default());
        let mask = RgbImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let pair = ImageMaskPair::new(
            DynamicImage::ImageLuma8(GrayImage::new(16, 16)),
            DynamicImage::ImageRgb8(mask),
        )?;

        let out = affine.apply(pair)?;
        assert_eq!(out.dimensions(), (16, 16));
        for pixel in out.mask.to_rgb8().pixels() {
            assert!(
                [Rgb([255, 0, 0]), Rgb([0, 0, 255]), Rgb([0, 0, 0])].contains(pixel),
                "nearest sampling must not invent label colors: {:?}",
                pixel
            );
        }
        Ok(())
    }
}
