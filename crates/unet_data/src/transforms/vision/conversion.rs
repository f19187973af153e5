use super::pair::ImageMaskPair;
use crate::config::{ColorMode, PipelineConfig};
use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{bail, ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

/// Mask values at or above this level count as "on".
const MASK_THRESHOLD: u8 = 128;

// ============================================================================
// AdjustMask
// ============================================================================

/// Encodes a decoded mask as binary class planes `[K, H, W]`.
///
/// | Mask mode | Planes |
/// |-----------|--------|
/// | L         | 1: `value >= 128` |
/// | RGB       | one per selected channel, in selection order, plus an optional background plane |
///
/// The background plane is 1 where the binarized RGB pixel equals
/// `background_color` exactly.
#[derive(Debug, Clone)]
pub struct AdjustMask {
    mode: ColorMode,
    channels: Vec<usize>,
    background: Option<[u8; 3]>,
}

impl AdjustMask {
    pub fn new(mode: ColorMode, channels: Vec<usize>, background: Option<[u8; 3]>) -> Result<Self> {
        if mode == ColorMode::Rgb {
            ensure!(
                !channels.is_empty() || background.is_some(),
                "RGB mask encoding needs at least one output plane"
            );
            ensure!(
                channels.iter().all(|&c| c < 3),
                "RGB mask channel indices must be < 3 (got {:?})",
                channels
            );
        }
        if let Some(color) = background {
            ensure!(
                color.iter().all(|&v| v <= 1),
                "Background color must be binary (got {:?})",
                color
            );
        }
        Ok(Self {
            mode,
            channels,
            background,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        match config.mask_color_mode {
            ColorMode::L => Self::new(ColorMode::L, vec![0], None),
            ColorMode::Rgb => Self::new(
                ColorMode::Rgb,
                config.mask_channel_indices()?,
                config.background_channel.then_some(config.background_color),
            ),
        }
    }

    /// Number of planes produced.
    pub fn planes(&self) -> usize {
        match self.mode {
            ColorMode::L => 1,
            ColorMode::Rgb => self.channels.len() + usize::from(self.background.is_some()),
        }
    }

    pub fn encode(&self, mask: &DynamicImage) -> Result<Tensor> {
        let (width, height) = mask.dimensions();
        let area = (width * height) as usize;
        let on = |v: u8| if v >= MASK_THRESHOLD { 1.0f32 } else { 0.0 };

        let data: Vec<f32> = match self.mode {
            ColorMode::L => mask.to_luma8().as_raw().iter().map(|&v| on(v)).collect(),
            ColorMode::Rgb => {
                let rgb = mask.to_rgb8();
                let mut data = Vec::with_capacity(self.planes() * area);
                for &c in &self.channels {
                    data.extend(rgb.pixels().map(|p| on(p[c])));
                }
                if let Some(bg) = self.background {
                    data.extend(rgb.pixels().map(|p| {
                        let binary = [p[0], p[1], p[2]].map(|v| (v >= MASK_THRESHOLD) as u8);
                        if binary == bg { 1.0 } else { 0.0 }
                    }));
                }
                data
            }
        };

        Ok(Tensor::from_slice(&data).reshape([self.planes() as i64, height as i64, width as i64]))
    }
}

// ============================================================================
// ToSample
// ============================================================================

/// Converts an [`ImageMaskPair`] into a [`Sample`].
///
/// The image becomes a channel-first f32 tensor multiplied by `rescale`
/// (`[1, H, W]` for L, `[3, H, W]` for RGB); the mask goes through
/// [`AdjustMask`].
#[derive(Debug, Clone)]
pub struct ToSample {
    rescale: f32,
    mask: AdjustMask,
}

impl ToSample {
    pub fn new(rescale: f32, mask: AdjustMask) -> Result<Self> {
        ensure!(
            rescale.is_finite() && rescale > 0.0,
            "rescale must be positive (got {})",
            rescale
        );
        Ok(Self { rescale, mask })
    }

    pub fn image_tensor(&self, img: &DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let channels = match img {
            DynamicImage::ImageLuma8(_) => 1,
            DynamicImage::ImageRgb8(_) => 3,
            other => bail!("Expected an L or RGB image, got {:?}", other.color()),
        };

        // interleaved HWC -> CHW
        Tensor::from_slice(img.as_bytes())
            .reshape([height as i64, width as i64, channels])
            .permute([2, 0, 1])
            .to_kind(Kind::Float)
            .f_mul_scalar(self.rescale as f64)
            .map(|t| t.contiguous())
            .context("Failed to rescale image tensor")
    }
}

impl Transform<ImageMaskPair, Sample> for ToSample {
    fn apply(&self, pair: ImageMaskPair) -> Result<Sample> {
        let image = self.image_tensor(&pair.image)?;
        let mask = self.mask.encode(&pair.mask)?;
        Sample::new(image, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn label_mask() -> DynamicImage {
        // red | green
        // blue| black
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 200]));
        img.put_pixel(1, 1, Rgb([0, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    fn plane(t: &Tensor, k: i64) -> Vec<f32> {
        Vec::<f32>::try_from(&t.select(0, k).reshape([-1])).unwrap()
    }

    #[test]
    fn test_rgb_mask_selects_channels_in_order() -> Result<()> {
        let adjust = AdjustMask::new(ColorMode::Rgb, vec![0, 2], None)?;
        let encoded = adjust.encode(&label_mask())?;
        assert_eq!(encoded.size(), vec![2, 2, 2]);
        assert_eq!(plane(&encoded, 0), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(plane(&encoded, 1), vec![0.0, 0.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_background_plane_matches_color() -> Result<()> {
        let adjust = AdjustMask::new(ColorMode::Rgb, vec![0, 2], Some([0, 1, 0]))?;
        assert_eq!(adjust.planes(), 3);
        let encoded = adjust.encode(&label_mask())?;
        assert_eq!(plane(&encoded, 2), vec![0.0, 1.0, 0.0, 0.0]);
        assert!(AdjustMask::new(ColorMode::Rgb, vec![0], Some([0, 255, 0])).is_err());
        Ok(())
    }

    #[test]
    fn test_grayscale_mask_is_thresholded() -> Result<()> {
        let mask = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 127, 128, 255][x as usize]]));
        let adjust = AdjustMask::new(ColorMode::L, vec![0], None)?;
        let encoded = adjust.encode(&DynamicImage::ImageLuma8(mask))?;
        assert_eq!(encoded.size(), vec![1, 1, 4]);
        assert_eq!(plane(&encoded, 0), vec![0.0, 0.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_to_sample_layout_and_rescale() -> Result<()> {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 51, 0]));
        let pair = ImageMaskPair::new(DynamicImage::ImageRgb8(img), {
            let mut m = RgbImage::new(3, 2);
            m.put_pixel(2, 1, Rgb([255, 0, 0]));
            DynamicImage::ImageRgb8(m)
        })?;

        let adjust = AdjustMask::new(ColorMode::Rgb, vec![0], None)?;
        let to_sample = ToSample::new(1.0 / 255.0, adjust)?;
        let sample = to_sample.apply(pair)?;

        assert_eq!(sample.image.size(), vec![3, 2, 3]);
        assert_eq!(sample.image.kind(), Kind::Float);
        assert!((sample.image.double_value(&[0, 1, 2]) - 1.0).abs() < 1e-6);
        assert!((sample.image.double_value(&[1, 1, 2]) - 0.2).abs() < 1e-6);
        assert_eq!(sample.mask.double_value(&[0, 1, 2]), 1.0);
        assert_eq!(sample.mask.double_value(&[0, 0, 0]), 0.0);
        Ok(())
    }

    #[test]
    fn test_to_sample_grayscale_image() -> Result<()> {
        let pair = ImageMaskPair::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255]))),
            DynamicImage::ImageLuma8(GrayImage::new(4, 4)),
        )?;
        let to_sample = ToSample::new(1.0 / 255.0, AdjustMask::new(ColorMode::L, vec![0], None)?)?;
        let sample = to_sample.apply(pair)?;
        assert_eq!(sample.image.size(), vec![1, 4, 4]);
        assert!((sample.image.max().double_value(&[]) - 1.0).abs() < 1e-6);
        Ok(())
    }
}
