//! src/config.rs
//!
//! Configuration for the image/mask pipeline.
//!
//! `PipelineConfig::default()` carries the settings the segmentation model was
//! tuned with (grayscale input, RGB mask with red/blue classes, 256x256 crops,
//! PCA color jitter on). Configs can be built programmatically:
//!
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .image_color_mode(ColorMode::Rgb)
//!     .batch_size(8)
//!     .seed(7)
//!     .build()?;
//! ```
//!
//! or loaded from JSON with [`PipelineConfig::from_json_file`]. Every field
//! has a default, so a JSON file only needs to list what it overrides.

use anyhow::{bail, ensure, Context, Result};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// ColorMode
// ============================================================================

/// Color mode of an image or mask on the pipeline side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorMode {
    /// Single-channel grayscale.
    L,
    /// Three-channel RGB.
    Rgb,
}

impl ColorMode {
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::L => 1,
            ColorMode::Rgb => 3,
        }
    }
}

impl FromStr for ColorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "L" => Ok(ColorMode::L),
            "RGB" => Ok(ColorMode::Rgb),
            other => bail!("Invalid colormode '{}' (expected 'L' or 'RGB')", other),
        }
    }
}

impl TryFrom<String> for ColorMode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColorMode> for String {
    fn from(mode: ColorMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::L => write!(f, "L"),
            ColorMode::Rgb => write!(f, "RGB"),
        }
    }
}

// ============================================================================
// Interpolation / LossKind
// ============================================================================

/// Filter used when resizing images to `target_size`. Masks are always
/// resized with nearest neighbour so label colors survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn filter_type(&self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
            Interpolation::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Loss the training loop should use with these masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    Tversky,
    CategoricalCrossentropy,
}

// ============================================================================
// AugmentConfig
// ============================================================================

/// Random geometric augmentation applied identically to image and mask.
///
/// Ranges follow the usual conventions:
/// - `rotation_range`: degrees, angle drawn from `[-r, r]`
/// - `width_shift_range` / `height_shift_range`: fraction of the image size
/// - `shear_range`: degrees
/// - `zoom_range`: scale drawn from `[1 - z, 1 + z]` per axis
///
/// Pixels outside the source image are filled with `cval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub rescale: f32,
    pub rotation_range: f32,
    pub width_shift_range: f32,
    pub height_shift_range: f32,
    pub shear_range: f32,
    pub zoom_range: f32,
    pub horizontal_flip: bool,
    pub vertical_flip: bool,
    pub cval: u8,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rescale: 1.0 / 255.0,
            rotation_range: 40.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            shear_range: 0.0,
            zoom_range: 0.1,
            horizontal_flip: true,
            vertical_flip: true,
            cval: 0,
        }
    }
}

impl AugmentConfig {
    /// Rescaling only, no geometric augmentation.
    pub fn rescale_only() -> Self {
        Self {
            rescale: 1.0 / 255.0,
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
            vertical_flip: false,
            cval: 0,
        }
    }

    /// Whether any affine component is active.
    pub fn has_affine(&self) -> bool {
        self.rotation_range > 0.0
            || self.width_shift_range > 0.0
            || self.height_shift_range > 0.0
            || self.shear_range > 0.0
            || self.zoom_range > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.rescale.is_finite() && self.rescale > 0.0,
            "rescale must be positive (got {})",
            self.rescale
        );
        for (name, value) in [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
            ("shear_range", self.shear_range),
            ("zoom_range", self.zoom_range),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{} must be non-negative (got {})",
                name,
                value
            );
        }
        ensure!(
            self.zoom_range < 1.0,
            "zoom_range must be below 1.0 (got {})",
            self.zoom_range
        );
        Ok(())
    }
}

// ============================================================================
// TrainingSchedule
// ============================================================================

/// Settings read by the training loop that consumes the batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSchedule {
    pub loss: LossKind,
    pub model: String,
    pub epochs: usize,
    pub train_steps: usize,
    pub valid_steps: usize,
    /// Epochs without improvement before early stopping.
    pub early_stopping_patience: usize,
}

impl Default for TrainingSchedule {
    fn default() -> Self {
        Self {
            loss: LossKind::Tversky,
            model: "unet".to_string(),
            epochs: 30,
            train_steps: 100,
            valid_steps: 50,
            early_stopping_patience: 5,
        }
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Full configuration of the image/mask pipeline.
///
/// Sizes are `(height, width)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub image_color_mode: ColorMode,
    pub mask_color_mode: ColorMode,
    /// Mask channels kept for RGB masks, in output order (e.g. `"RB"`).
    /// Only uppercase `R`, `G` and `B` are accepted.
    pub mask_use_colors: String,
    /// Append a background channel to RGB masks.
    pub background_channel: bool,
    /// Binarized RGB color marking background pixels in the mask.
    pub background_color: [u8; 3],
    pub target_size: (u32, u32),
    pub sample_size: (u32, u32),
    /// Spatial granularity the network needs; sample sizes must be multiples.
    pub frame_size: u32,
    pub interpolation: Interpolation,
    pub pca_color: bool,
    pub pca_color_range: (f64, f64),
    pub pca_color_std: f64,
    pub batch_size: usize,
    pub seed: Option<u64>,
    /// `None` means rescaling only.
    pub augment: Option<AugmentConfig>,
    pub schedule: TrainingSchedule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_color_mode: ColorMode::L,
            mask_color_mode: ColorMode::Rgb,
            mask_use_colors: "RB".to_string(),
            background_channel: false,
            background_color: [0, 1, 0],
            target_size: (256, 256),
            sample_size: (256, 256),
            frame_size: 32,
            interpolation: Interpolation::Nearest,
            pca_color: true,
            pca_color_range: (-0.2, 0.2),
            pca_color_std: 0.1,
            batch_size: 4,
            seed: None,
            augment: Some(AugmentConfig::default()),
            schedule: TrainingSchedule::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Loads and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Augmentation settings in effect (rescale only when none configured).
    pub fn augment_or_default(&self) -> AugmentConfig {
        self.augment.clone().unwrap_or_else(AugmentConfig::rescale_only)
    }

    /// Channel indices (0 = R, 1 = G, 2 = B) kept from RGB masks.
    pub fn mask_channel_indices(&self) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(self.mask_use_colors.len());
        for c in self.mask_use_colors.chars() {
            let index = match c {
                'R' => 0,
                'G' => 1,
                'B' => 2,
                other => bail!(
                    "Invalid mask color '{}' in '{}' (expected R, G or B)",
                    other,
                    self.mask_use_colors
                ),
            };
            ensure!(
                !indices.contains(&index),
                "Duplicate mask color '{}' in '{}'",
                c,
                self.mask_use_colors
            );
            indices.push(index);
        }
        Ok(indices)
    }

    /// Number of channels in encoded masks.
    pub fn mask_channels(&self) -> Result<usize> {
        Ok(match self.mask_color_mode {
            ColorMode::L => 1,
            ColorMode::Rgb => {
                self.mask_channel_indices()?.len() + usize::from(self.background_channel)
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be > 0");

        let (target_h, target_w) = self.target_size;
        let (sample_h, sample_w) = self.sample_size;
        ensure!(
            target_h > 0 && target_w > 0,
            "target_size must be positive (got {}x{})",
            target_h,
            target_w
        );
        ensure!(
            sample_h > 0 && sample_w > 0,
            "sample_size must be positive (got {}x{})",
            sample_h,
            sample_w
        );
        ensure!(
            sample_h <= target_h && sample_w <= target_w,
            "sample_size {}x{} does not fit in target_size {}x{}",
            sample_h,
            sample_w,
            target_h,
            target_w
        );
        ensure!(self.frame_size > 0, "frame_size must be > 0");
        ensure!(
            sample_h % self.frame_size == 0 && sample_w % self.frame_size == 0,
            "sample_size {}x{} must be a multiple of frame_size {}",
            sample_h,
            sample_w,
            self.frame_size
        );

        let (low, high) = self.pca_color_range;
        ensure!(
            low < high,
            "pca_color_range must satisfy low < high (got ({}, {}))",
            low,
            high
        );
        ensure!(
            self.pca_color_std.is_finite() && self.pca_color_std > 0.0,
            "pca_color_std must be positive (got {})",
            self.pca_color_std
        );

        if self.mask_color_mode == ColorMode::Rgb {
            ensure!(
                !self.mask_use_colors.is_empty(),
                "mask_use_colors must name at least one channel"
            );
            self.mask_channel_indices()?;
        }

        if let Some(augment) = &self.augment {
            augment.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`] with method chaining.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn image_color_mode(mut self, mode: ColorMode) -> Self {
        self.config.image_color_mode = mode;
        self
    }

    pub fn mask_color_mode(mut self, mode: ColorMode) -> Self {
        self.config.mask_color_mode = mode;
        self
    }

    pub fn mask_use_colors(mut self, colors: impl Into<String>) -> Self {
        self.config.mask_use_colors = colors.into();
        self
    }

    pub fn background_channel(mut self, enabled: bool, color: [u8; 3]) -> Self {
        self.config.background_channel = enabled;
        self.config.background_color = color;
        self
    }

    /// `(height, width)` images are resized to after loading.
    pub fn target_size(mut self, height: u32, width: u32) -> Self {
        self.config.target_size = (height, width);
        self
    }

    /// `(height, width)` of the random crop.
    pub fn sample_size(mut self, height: u32, width: u32) -> Self {
        self.config.sample_size = (height, width);
        self
    }

    pub fn frame_size(mut self, frame_size: u32) -> Self {
        self.config.frame_size = frame_size;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.config.interpolation = interpolation;
        self
    }

    pub fn pca_color(mut self, enabled: bool) -> Self {
        self.config.pca_color = enabled;
        self
    }

    pub fn pca_color_range(mut self, low: f64, high: f64) -> Self {
        self.config.pca_color_range = (low, high);
        self
    }

    pub fn pca_color_std(mut self, std: f64) -> Self {
        self.config.pca_color_std = std;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// `None` disables geometric augmentation (rescale only).
    pub fn augment(mut self, augment: Option<AugmentConfig>) -> Self {
        self.config.augment = augment;
        self
    }

    pub fn schedule(mut self, schedule: TrainingSchedule) -> Self {
        self.config.schedule = schedule;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
