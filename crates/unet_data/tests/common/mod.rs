#![allow(dead_code)]

use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::fs;
use std::path::Path;
use tch::Tensor;
use unet_data::config::{AugmentConfig, PipelineConfig};

pub const BRIGHT: u8 = 220;
pub const DARK: u8 = 30;

/// Foreground layout of pair `index`; shifted per pair so pairs differ.
pub fn is_foreground(x: u32, y: u32, index: usize) -> bool {
    (x as usize + 2 * y as usize + index) % 5 < 2
}

/// Writes `count` grayscale images and matching RGB masks under
/// `<root>/<folder>/{image,mask}`.
///
/// Foreground pixels are `BRIGHT` in the image and red in the mask; the rest
/// are `DARK` and blue.
pub fn write_dataset(root: &Path, folder: &str, count: usize, size: u32) -> Result<()> {
    let image_dir = root.join(folder).join("image");
    let mask_dir = root.join(folder).join("mask");
    fs::create_dir_all(&image_dir)?;
    fs::create_dir_all(&mask_dir)?;

    for i in 0..count {
        let image = GrayImage::from_fn(size, size, |x, y| {
            Luma([if is_foreground(x, y, i) { BRIGHT } else { DARK }])
        });
        let mask = RgbImage::from_fn(size, size, |x, y| {
            if is_foreground(x, y, i) {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let name = format!("{:03}.png", i);
        image.save(image_dir.join(&name))?;
        mask.save(mask_dir.join(&name))?;
    }
    Ok(())
}

/// 64x64 images cropped to 32x32, batch of 3.
pub fn small_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.target_size = (64, 64);
    config.sample_size = (32, 32);
    config.frame_size = 32;
    config.batch_size = 3;
    config
}

/// `small_config` restricted to exact pixel moves (flips and crops).
pub fn exact_config() -> PipelineConfig {
    let mut config = small_config();
    config.augment = Some(AugmentConfig {
        horizontal_flip: true,
        vertical_flip: true,
        ..AugmentConfig::rescale_only()
    });
    config.pca_color = false;
    config
}

pub fn to_vec(t: &Tensor) -> Vec<f32> {
    Vec::<f32>::try_from(&t.reshape([-1])).unwrap()
}
