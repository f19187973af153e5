//! src/transforms/vision/mod.rs
//!
//! Vision transforms for paired image/mask preprocessing and augmentation.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── pair.rs          → ImageMaskPair, the unit every transform works on
//! ├── io.rs            → Loading + color mode conversion + resize to target size
//! ├── geometric.rs     → Synchronized spatial transforms (affine, crop)
//! ├── augmentation.rs  → Synchronized flips
//! ├── photometric.rs   → PCA color jitter (image only)
//! └── conversion.rs    → Pair → tensors, mask channel encoding
//! ```
//!
//! Every spatial transform draws its random parameters once per pair and
//! applies them to both image and mask.
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::{Compose, Transform};
//! use crate::transforms::vision::*;
//!
//! let augment = Compose::new()
//!     .push(RandomAffinePair::from_config(&augment_config))
//!     .push(RandomFlipPair::new(0.5, 0.5)?)
//!     .push(RandomCropPair::new(256, 256)?)
//!     .push(PcaColorJitter::new((-0.2, 0.2), 0.1)?);
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod pair;
pub mod photometric;

pub use augmentation::RandomFlipPair;
pub use conversion::{AdjustMask, ToSample};
pub use geometric::{AffineParams, RandomAffinePair, RandomCropPair};
pub use io::LoadImagePair;
pub use pair::ImageMaskPair;
pub use photometric::PcaColorJitter;
