//! Block cache.
//!
//! A size-bounded LRU over decoded data blocks, keyed by table and block
//! number. Eviction is delegated to the `lru` crate; this module only adds
//! the keying and hit/miss accounting the read path needs.
//!
//! Each entry remembers whether its CRC was checked when the block was read,
//! so a checksum-verifying read never trusts a block decoded without one.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::storage::DataBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCacheKey {
    pub table_id: u64,
    pub block_no: usize,
}

impl BlockCacheKey {
    pub fn new(table_id: u64, block_no: usize) -> Self {
        Self { table_id, block_no }
    }
}

/// A resident block and whether its checksum was verified on the way in
#[derive(Debug, Clone)]
pub struct CachedBlock {
    pub block: Arc<DataBlock>,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub len: usize,
}

impl CacheStats {
    pub fn total_lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.total_lookups();
        if total == 0 {
            return None;
        }
        Some(self.hits as f64 / total as f64)
    }
}

/// Shared cache of decoded data blocks
pub struct BlockCache {
    inner: Mutex<LruCache<BlockCacheKey, CachedBlock>>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("len", &self.len())
            .finish()
    }
}

impl BlockCache {
    pub fn new(capacity_blocks: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity_blocks).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &BlockCacheKey) -> Option<CachedBlock> {
        let value = self.inner.lock().get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Insert or replace a block. `verified` records whether its CRC was checked.
    pub fn insert(&self, key: BlockCacheKey, block: Arc<DataBlock>, verified: bool) {
        self.inner.lock().put(key, CachedBlock { block, verified });
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            len: self.len(),
        }
    }
}
