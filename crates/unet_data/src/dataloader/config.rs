//! src/dataloader/config.rs
//!
//! Configuration for DataLoader behaviour
//!
//! Example:
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(4)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! ```

/// Configuration for DataLoader
#[derive(Debug, Clone, Default)]
pub struct DataLoaderConfig {
    /// Number of pairs per batch (defaults to 1 if not specified)
    pub batch_size: Option<usize>,
    /// Whether to drop the last incomplete batch (defaults to false if not specified)
    pub drop_last: Option<bool>,
    /// Whether to reshuffle the pairs every epoch (defaults to false)
    pub shuffle: Option<bool>,
    /// Random seed for reproducible shuffling and augmentation.
    /// Drawn from OS entropy when not set.
    pub seed: Option<u64>,
}

impl DataLoaderConfig {
    pub fn builder() -> DataLoaderConfigBuilder {
        DataLoaderConfigBuilder::default()
    }
}

/// Builder for DataLoaderConfig with method chaining
#[derive(Default)]
pub struct DataLoaderConfigBuilder {
    config: DataLoaderConfig,
}

impl DataLoaderConfigBuilder {
    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = Some(size);
        self
    }

    /// Set whether to drop_last
    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = Some(drop);
        self
    }

    /// Set whether to shuffle dataset every epoch
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = Some(shuffle);
        self
    }

    /// Set the random seed for reproducible data loading.
    ///
    /// When set, this seed controls both the pair order (if shuffle = true)
    /// and every random augmentation draw.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DataLoaderConfig {
        self.config
    }
}
