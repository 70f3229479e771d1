//! Storage Module
//!
//! Persistent storage layer using block-based SSTables.
//!
//! ## Responsibilities
//! - Persist memtable contents to disk in sorted, checksummed blocks
//! - Point lookups and range scans one block at a time
//! - Keep block indexes and table properties in memory
//! - Count block reads so callers can observe I/O

mod manager;
mod sstable;

pub use manager::StorageManager;
pub(crate) use sstable::encoded_len;
pub use sstable::{
    BlockFetch, BlockHandle, BlockLoader, CursorPosition, DataBlock, SSTable, SSTableBuilder,
    SSTableReader, TableCursor, TableProperties,
};
