//! src/dataloader/mod.rs
//!
//! This module implements the `DataLoader`.
//!
//! The `DataLoader` coordinates the `SegmentationDataset`, `Sampler`, and
//! `Collator` to turn image/mask pairs on disk into training batches.
//!
//! # Architecture Overview
//!
//! ```text
//!              ┌──────────────────────┐
//!              │ SegmentationDataset  │ (image/mask path pairs)
//!              └──────────┬───────────┘
//!                         │ load + augment + convert
//!                         ↓
//!                    ┌─────────┐
//!                    │ Sampler │ (sequential or reshuffled per epoch)
//!                    └────┬────┘
//!                         │ provides batch indices
//!                         ↓
//!                  ┌──────────────┐
//!                  │  DataLoader  │ ←───── Config (batch_size, shuffle, seed)
//!                  └──────┬───────┘
//!                         │
//!                         ↓
//!                   ┌──────────┐
//!                   │ Collator │ (stacks samples)
//!                   └────┬─────┘
//!                        ↓
//!                   ┌───────────┐
//!                   │ MiniBatch │ (images [N,C,H,W], masks [N,K,H,W])
//!                   └───────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs             # Public API exports + module-level architecture docs
//! ├── config.rs          # DataLoaderConfig and builder
//! ├── loader.rs          # DataLoader, epoch handling, DataLoaderIter
//! └── common/
//!     ├── mod.rs
//!     └── thread.rs      # Thread-local RNG slot used by random transforms
//! ```
//!
//! # Example Usage
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(4)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! let dataloader = DataLoader::new(dataset, config)?;
//!
//! for batch in dataloader.iter() {
//!     let batch: MiniBatch = batch?;
//!     // batch.images, batch.masks
//! }
//! ```
//!
//! Loading is single-threaded; memory use is O(batch_size).

mod common;
mod config;
mod loader;

pub use config::{DataLoaderConfig, DataLoaderConfigBuilder};
pub use loader::{DataLoader, DataLoaderIter};

pub use common::thread::{
    init_worker_rng, with_scoped_rng, with_worker_rng, worker_gen_bool, worker_gen_range,
    worker_rng, worker_seed, worker_standard_normal, WORKER_RNG,
};
