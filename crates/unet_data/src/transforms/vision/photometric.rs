use super::pair::ImageMaskPair;
use crate::dataloader::worker_standard_normal;
use crate::transforms::Transform;
use anyhow::{bail, ensure, Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use tch::Tensor;

// ============================================================================
// PcaColorJitter
// ============================================================================

/// PCA color augmentation ("fancy PCA").
///
/// Shifts every pixel of the image by one per-image offset along the
/// principal axes of its own color distribution. The mask is never touched.
///
/// # Procedure
/// ```text
/// X        = pixels as (N, C), C = 3 for RGB, 1 for grayscale
/// var_c    = population variance of channel c
/// Z        = (X - mean) * sqrt(C / sum(var))      (total variance = C)
/// Σ        = cov(Z)                                (N - 1 normalization)
/// Σ        = P diag(λ) Pᵀ
/// α        ~ N(0, std²)^C, redrawn until low < α_c < high for every c
/// delta    = trunc(255 · P (α ⊙ λ))
/// output   = clip(X + delta, 0, 255)
/// ```
///
/// Images with fewer than two pixels or no color variance pass through
/// unchanged.
///
/// # Example
/// ```ignore
/// let jitter = PcaColorJitter::new((-0.2, 0.2), 0.1)?;
/// let augmented = jitter.apply(pair)?;
/// ```
#[derive(Debug, Clone)]
pub struct PcaColorJitter {
    range: (f64, f64),
    std: f64,
    max_attempts: usize,
}

/// Eigen-decomposition of the normalized pixel covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalComponents {
    pub channels: usize,
    /// Eigenvalues, ascending.
    pub eigenvalues: Vec<f64>,
    /// Row-major `channels x channels`; column `j` is the eigenvector of `eigenvalues[j]`.
    pub eigenvectors: Vec<f64>,
}

impl PrincipalComponents {
    /// Computes the components of interleaved `pixels` with `channels` per pixel.
    /// Returns `None` when the distribution is degenerate.
    pub fn from_pixels(pixels: &[u8], channels: usize) -> Result<Option<Self>> {
        ensure!(channels > 0, "Channel count must be positive");
        ensure!(
            pixels.len() % channels == 0,
            "Pixel buffer of length {} is not a multiple of {} channels",
            pixels.len(),
            channels
        );
        let n = pixels.len() / channels;
        if n < 2 {
            return Ok(None);
        }

        let mut mean = vec![0.0f64; channels];
        for px in pixels.chunks_exact(channels) {
            for (m, &v) in mean.iter_mut().zip(px) {
                *m += v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n as f64);

        let mut variance = vec![0.0f64; channels];
        for px in pixels.chunks_exact(channels) {
            for c in 0..channels {
                let d = px[c] as f64 - mean[c];
                variance[c] += d * d;
            }
        }
        let total_variance: f64 = variance.iter().map(|v| v / n as f64).sum();
        if total_variance <= f64::EPSILON {
            return Ok(None);
        }
        let scale = (channels as f64 / total_variance).sqrt();

        let mut covariance = vec![0.0f64; channels * channels];
        for px in pixels.chunks_exact(channels) {
            for a in 0..channels {
                let da = (px[a] as f64 - mean[a]) * scale;
                for b in a..channels {
                    let db = (px[b] as f64 - mean[b]) * scale;
                    covariance[a * channels + b] += da * db;
                }
            }
        }
        for a in 0..channels {
            for b in a..channels {
                let value = covariance[a * channels + b] / (n - 1) as f64;
                covariance[a * channels + b] = value;
                covariance[b * channels + a] = value;
            }
        }

        let c = channels as i64;
        let (eigenvalues, eigenvectors) = Tensor::from_slice(&covariance)
            .reshape([c, c])
            .f_linalg_eigh("L")
            .context("Eigen-decomposition of the color covariance failed")?;

        Ok(Some(Self {
            channels,
            eigenvalues: Vec::<f64>::try_from(&eigenvalues)?,
            eigenvectors: Vec::<f64>::try_from(&eigenvectors.reshape([-1]))?,
        }))
    }

    /// `255 · P (α ⊙ λ)`, truncated toward zero.
    pub fn color_delta(&self, alphas: &[f64]) -> Result<Vec<i32>> {
        let c = self.channels;
        ensure!(
            alphas.len() == c && self.eigenvalues.len() == c && self.eigenvectors.len() == c * c,
            "Expected {} coefficients, {} eigenvalues and {} eigenvector entries (got {}, {}, {})",
            c,
            c,
            c * c,
            alphas.len(),
            self.eigenvalues.len(),
            self.eigenvectors.len()
        );
        Ok((0..c)
            .map(|row| {
                let shift: f64 = (0..c)
                    .map(|col| {
                        self.eigenvectors[row * c + col] * alphas[col] * self.eigenvalues[col]
                    })
                    .sum();
                (shift * 255.0) as i32
            })
            .collect())
    }
}

impl PcaColorJitter {
    /// `range` bounds each coefficient (exclusive), `std` is the standard
    /// deviation coefficients are drawn with.
    pub fn new(range: (f64, f64), std: f64) -> Result<Self> {
        let (low, high) = range;
        ensure!(low < high, "PCA range must satisfy low < high (got ({}, {}))", low, high);
        ensure!(std > 0.0 && std.is_finite(), "PCA std must be positive (got {})", std);
        Ok(Self {
            range,
            std,
            max_attempts: 10_000,
        })
    }

    /// Draws `channels` coefficients by rejection sampling.
    pub fn sample_alphas(&self, channels: usize) -> Result<Vec<f64>> {
        let (low, high) = self.range;
        for _ in 0..self.max_attempts {
            let alphas: Vec<f64> = (0..channels)
                .map(|_| worker_standard_normal() * self.std)
                .collect();
            if alphas.iter().all(|&a| a > low && a < high) {
                return Ok(alphas);
            }
        }
        bail!(
            "No PCA coefficients inside ({}, {}) after {} draws with std {}",
            low,
            high,
            self.max_attempts,
            self.std
        )
    }

    fn shift_pixels(pixels: &mut [u8], delta: &[i32]) {
        for px in pixels.chunks_exact_mut(delta.len()) {
            for (v, &d) in px.iter_mut().zip(delta) {
                *v = (*v as i32 + d).clamp(0, 255) as u8;
            }
        }
    }

    /// Jitters an interleaved buffer in place. Degenerate buffers are left as is.
    fn jitter_raw(&self, raw: &mut [u8], channels: usize) -> Result<()> {
        let Some(components) = PrincipalComponents::from_pixels(raw, channels)? else {
            return Ok(());
        };
        let delta = components.color_delta(&self.sample_alphas(channels)?)?;
        tracing::trace!(?delta, "pca color delta");
        Self::shift_pixels(raw, &delta);
        Ok(())
    }

    /// Applies the jitter to a single image (`Luma8` or `Rgb8`).
    pub fn jitter_image(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageLuma8(buf) => {
                let (width, height) = buf.dimensions();
                let mut raw = buf.into_raw();
                self.jitter_raw(&mut raw, 1)?;
                DynamicImage::ImageLuma8(
                    GrayImage::from_raw(width, height, raw).context("Invalid grayscale buffer")?,
                )
            }
            DynamicImage::ImageRgb8(buf) => {
                let (width, height) = buf.dimensions();
                let mut raw = buf.into_raw();
                self.jitter_raw(&mut raw, 3)?;
                DynamicImage::ImageRgb8(
                    RgbImage::from_raw(width, height, raw).context("Invalid RGB buffer")?,
                )
            }
            other => bail!("PCA color jitter expects L or RGB images, got {:?}", other.color()),
        })
    }
}

impl Transform<ImageMaskPair, ImageMaskPair> for PcaColorJitter {
    fn apply(&self, pair: ImageMaskPair) -> Result<ImageMaskPair> {
        Ok(ImageMaskPair {
            image: self.jitter_image(pair.image)?,
            mask: pair.mask,
        })
    }
}
