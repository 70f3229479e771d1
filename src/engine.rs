//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Assign sequence numbers to writes and publish them to readers
//! - Serve point lookups and iterators under per-request [`ReadOptions`]
//! - Hand out and release snapshots
//! - Flush the MemTable to an SSTable when it is full

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::cache::{BlockCache, CacheStats};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::iterator::DbIterator;
use crate::key::SeqNo;
use crate::memtable::MemTable;
use crate::options::ReadOptions;
use crate::resolver::{ReadOutcome, ReadPlan, TierResolver};
use crate::snapshot::{SnapshotId, SnapshotRegistry};
use crate::storage::{encoded_len, StorageManager};

/// Counters describing read-path activity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    /// Data blocks read from SSTable files
    pub block_reads: u64,
    pub cache: CacheStats,
    pub live_snapshots: usize,
    pub sstable_count: usize,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/delete_range/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → memtable → storage (write) → publish seqno
///
/// - **Reads** (get/iterators): No write_lock needed
///   - A read resolves its snapshot first, then consults the memtable, then
///     takes the table list
///   - SSTable readers use interior mutability, so block reads only hold the
///     per-file mutex
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Decoded data blocks shared by all reads
    cache: BlockCache,

    /// Latest published sequence number and pinned snapshots
    snapshots: SnapshotRegistry,

    /// Serializes write operations (put/delete/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open/create data directory
    /// 3. Load existing SSTables
    /// 4. Restore the last sequence number from table properties
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir, config.block_size)?;
        let last_seqno = storage.max_seqno();

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            last_seqno,
            "engine opened"
        );

        Ok(Self {
            cache: BlockCache::new(config.block_cache_capacity),
            snapshots: SnapshotRegistry::new(last_seqno),
            memtable: MemTable::new(),
            storage,
            storage_dir,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Point lookup under `opts`
    ///
    /// Bounds, prefix and tailing settings do not affect point lookups, but
    /// the options are still validated.
    pub fn get(&self, opts: &ReadOptions<'_>, key: &[u8]) -> Result<ReadOutcome> {
        opts.validate()?;
        let seqno = self.snapshots.resolve(opts.snapshot())?;
        self.resolver(opts, seqno).get(key)
    }

    /// Create an iterator reading under `opts`
    ///
    /// The options are copied; the bounds they reference must outlive the
    /// iterator.
    pub fn new_iterator<'a>(&'a self, opts: &ReadOptions<'a>) -> Result<DbIterator<'a>> {
        opts.validate()?;
        let seqno = self.snapshots.resolve(opts.snapshot())?;
        Ok(DbIterator::new(
            self.resolver(opts, seqno),
            &self.snapshots,
            *opts,
            self.config.prefix_extractor,
        ))
    }

    fn resolver(&self, opts: &ReadOptions<'_>, seqno: SeqNo) -> TierResolver<'_> {
        TierResolver::new(
            &self.memtable,
            &self.storage,
            &self.cache,
            ReadPlan::new(opts, seqno),
        )
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Pin the current state for later reads
    pub fn create_snapshot(&self) -> SnapshotId {
        let id = self.snapshots.create();
        tracing::debug!(snapshot = id.0, "snapshot created");
        id
    }

    /// Release a snapshot. Returns false if it was unknown or already released.
    pub fn release_snapshot(&self, id: SnapshotId) -> bool {
        self.snapshots.release(id)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        encoded_len(key.len(), "key")?;
        encoded_len(value.len(), "value")?;
        let _write_guard = self.write_lock.lock();

        let seqno = self.next_seqno();
        let new_size = self.memtable.put(key, value, seqno);
        self.snapshots.publish(seqno);

        self.maybe_flush(new_size)
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        encoded_len(key.len(), "key")?;
        let _write_guard = self.write_lock.lock();

        let seqno = self.next_seqno();
        let new_size = self.memtable.delete(key, seqno);
        self.snapshots.publish(seqno);

        self.maybe_flush(new_size)
    }

    /// Delete every key in `[start, end)`
    pub fn delete_range(&self, start: &[u8], end: &[u8]) -> Result<()> {
        if start >= end {
            return Err(StrataError::InvalidArgument(
                "delete_range start must be below end".to_string(),
            ));
        }
        encoded_len(start.len(), "key")?;
        encoded_len(end.len(), "key")?;
        let _write_guard = self.write_lock.lock();

        let seqno = self.next_seqno();
        let new_size = self.memtable.delete_range(start, end, seqno);
        self.snapshots.publish(seqno);

        self.maybe_flush(new_size)
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Called with the write lock held
    fn next_seqno(&self) -> SeqNo {
        self.snapshots.latest_seqno() + 1
    }

    fn maybe_flush(&self, memtable_size: usize) -> Result<()> {
        if memtable_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        // The table is visible to readers before the memtable is cleared
        let sstable = self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        tracing::info!(
            path = %sstable.path.display(),
            entries = sstable.entry_count(),
            blocks = sstable.block_count,
            "memtable flushed"
        );
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data to an SSTable
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Read-path counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            block_reads: self.storage.block_reads(),
            cache: self.cache.stats(),
            live_snapshots: self.snapshots.live_count(),
            sstable_count: self.storage.sstable_count(),
        }
    }

    /// Latest published sequence number
    pub fn latest_seqno(&self) -> SeqNo {
        self.snapshots.latest_seqno()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("latest_seqno", &self.latest_seqno())
            .field("sstables", &self.sstable_count())
            .finish()
    }
}
