//! Storage Manager
//!
//! Manages multiple SSTables and coordinates flushes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Hand out the table list (newest → oldest) to readers
//! - Create new SSTables from MemTable flushes
//! - Track SSTable lifecycle

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, StrataError};
use crate::key::{SeqNo, ValueEntry};
use crate::memtable::MemTable;

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - Readers clone the `Arc` list and read blocks without holding the lock
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Target data block size for new tables
    block_size: usize,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<Arc<SSTableReader>>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Open readers for each (loads indexes and properties into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path, block_size: usize) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        // Sort newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            let reader = SSTableReader::open(&sstable_path, *id)?;
            sstables.push(Arc::new(reader));
        }

        // Next ID = max + 1, or 1 if no SSTables exist
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            tables = sstables.len(),
            next_id,
            "storage opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            block_size,
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Current tables, newest first
    pub fn tables(&self) -> Vec<Arc<SSTableReader>> {
        self.sstables.read().clone()
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Writes every version and range tombstone, opens a reader for the new
    /// file and publishes it at the front of the list. The caller clears the
    /// memtable afterwards, so readers always find the data in one place.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(StrataError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path, self.block_size)?;
        for entry in memtable.iter() {
            match &entry.value {
                ValueEntry::Value(v) => builder.add(entry.user_key(), entry.seqno(), v)?,
                ValueEntry::Tombstone => builder.add_tombstone(entry.user_key(), entry.seqno())?,
            }
        }
        for tombstone in memtable.range_tombstones() {
            builder.add_range_tombstone(tombstone)?;
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path, id)?;
        self.sstables.write().insert(0, Arc::new(reader));

        Ok(metadata)
    }

    /// Highest sequence number stored in any table
    pub fn max_seqno(&self) -> SeqNo {
        self.sstables
            .read()
            .iter()
            .map(|t| t.max_seqno())
            .max()
            .unwrap_or(0)
    }

    /// Data blocks read from files across all tables
    pub fn block_reads(&self) -> u64 {
        self.sstables.read().iter().map(|t| t.block_reads()).sum()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
