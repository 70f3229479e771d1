//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage, split
//! into checksummed data blocks so the block cache can hold them individually.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "STKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Blocks (variable)                                  │
//! │   [KeyLen: u32][SeqNo: u64][ValLen: u32][Key][Value]    │
//! │   ... repeated for each entry in the block ...          │
//! │   [CRC32: u32] over the block's entries                 │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [FirstLen: u32][LastLen: u32][Offset: u64][Size: u32] │
//! │   [FirstKey][LastKey]  ... one per data block ...       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Properties Block (bincode TableProperties)              │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                       │
//! │   IndexOffset: u64 | PropsOffset: u64                   │
//! │   IndexCRC: u32 | PropsCRC: u32                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod block;
mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::key::SeqNo;
use crate::range_tombstone::RangeTombstone;

pub(crate) use block::encoded_len;
pub use block::DataBlock;
pub use builder::SSTableBuilder;
pub use iterator::{BlockFetch, BlockLoader, CursorPosition, TableCursor};
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, block codec)
// =============================================================================

/// Magic bytes identifying a StrataKV SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"STKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + PropsOffset (8) + IndexCRC (4) + PropsCRC (4)
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Entry header: KeyLen (4) + SeqNo (8) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 16;

/// Index entry header: FirstLen (4) + LastLen (4) + Offset (8) + Size (4)
pub(crate) const INDEX_ENTRY_HEADER_SIZE: usize = 20;

/// Block trailer: CRC32 (4)
pub(crate) const BLOCK_TRAILER_SIZE: usize = 4;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

// =============================================================================
// Index and Properties
// =============================================================================

/// Location and key range of one data block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHandle {
    pub first_key: Bytes,
    pub last_key: Bytes,
    pub offset: u64,
    /// Block size including the CRC trailer
    pub size: u32,
}

/// Table-wide metadata, loaded when the table is opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProperties {
    pub entry_count: u64,
    pub min_key: Bytes,
    pub max_key: Bytes,
    pub max_seqno: SeqNo,
    pub range_tombstones: Vec<RangeTombstone>,
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// SSTable metadata returned by the builder and by flushes
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of point entries in this SSTable
    pub entry_count: u64,
    /// Number of data blocks
    pub block_count: usize,
    /// Smallest user key (for range filtering)
    pub min_key: Bytes,
    /// Largest user key (for range filtering)
    pub max_key: Bytes,
    /// Highest sequence number stored
    pub max_seqno: SeqNo,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && key >= self.min_key.as_ref() && key <= self.max_key.as_ref()
    }
}
