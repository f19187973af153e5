pub mod collator;
pub mod config;
pub mod dataloader;
pub mod dataset;
pub mod generator;
pub mod logging;
pub mod minibatch;
pub mod preview;
pub mod readers;
pub mod sample;
pub mod sampler;
pub mod transforms;

pub use collator::{Collator, StackCollator};
pub use config::{AugmentConfig, ColorMode, PipelineConfig};
pub use dataloader::{DataLoader, DataLoaderConfig};
pub use dataset::{DataSource, SegmentationDataset};
pub use generator::{image_mask_generator, ImageMaskGenerator};
pub use minibatch::MiniBatch;
pub use preview::write_preview;
pub use sample::Sample;
