//! Configuration for StrataKV
//!
//! Centralized engine configuration with sensible defaults. Per-request read
//! parameters live in [`crate::options::ReadOptions`], not here.

use std::path::PathBuf;

use crate::error::{Result, StrataError};

/// Main configuration for a StrataKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// Target size of an SSTable data block (in bytes). Blocks are only cut
    /// between user keys, so a block may exceed this.
    pub block_size: usize,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Read Path Configuration
    // -------------------------------------------------------------------------
    /// Block cache capacity, counted in data blocks
    pub block_cache_capacity: usize,

    /// Prefix extractor used by `prefix_same_as_start` iteration
    pub prefix_extractor: Option<PrefixExtractor>,
}

/// Derives the prefix of a user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixExtractor {
    /// First `n` bytes. Keys shorter than `n` are outside the domain.
    FixedLength(usize),

    /// First `min(n, key.len())` bytes. Every key is in the domain.
    Capped(usize),
}

impl PrefixExtractor {
    /// Prefix of `key`, or `None` when the key is outside the extractor's domain.
    pub fn prefix<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        match *self {
            PrefixExtractor::FixedLength(n) => key.get(..n),
            PrefixExtractor::Capped(n) => Some(&key[..n.min(key.len())]),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stratakv_data"),
            block_size: 4 * 1024,                  // 4 KB
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            block_cache_capacity: 1024,
            prefix_extractor: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(StrataError::Config("block_size must be non-zero".to_string()));
        }
        if self.memtable_size_limit == 0 {
            return Err(StrataError::Config(
                "memtable_size_limit must be non-zero".to_string(),
            ));
        }
        if self.block_cache_capacity == 0 {
            return Err(StrataError::Config(
                "block_cache_capacity must be non-zero".to_string(),
            ));
        }
        if let Some(PrefixExtractor::FixedLength(0) | PrefixExtractor::Capped(0)) =
            self.prefix_extractor
        {
            return Err(StrataError::Config(
                "prefix extractor length must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the target data block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the block cache capacity (in blocks)
    pub fn block_cache_capacity(mut self, blocks: usize) -> Self {
        self.config.block_cache_capacity = blocks;
        self
    }

    /// Set the prefix extractor
    pub fn prefix_extractor(mut self, extractor: PrefixExtractor) -> Self {
        self.config.prefix_extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
