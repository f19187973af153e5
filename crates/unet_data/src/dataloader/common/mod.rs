//! src/dataloader/common/mod.rs
//!
//! Utilities shared by the loader and the randomized transforms.

pub mod thread;
