//! SSTable Reader
//!
//! Opens SSTable files, keeps the block index and properties in memory and
//! reads data blocks on demand.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, StrataError};
use crate::key::SeqNo;
use crate::range_tombstone::RangeTombstone;

use super::block::{read_u32, read_u64};
use super::{
    BlockHandle, DataBlock, TableProperties, FOOTER_SIZE, HEADER_SIZE, INDEX_ENTRY_HEADER_SIZE,
    MAGIC, VERSION,
};

/// Reader for SSTable files.
///
/// The index and properties are read and checksum-verified once in `open`.
/// Only data blocks touch the file afterwards; the file handle sits behind a
/// mutex so lookups take `&self`.
pub struct SSTableReader {
    id: u64,
    path: PathBuf,
    /// File handle for reading blocks
    file: Mutex<BufReader<File>>,
    /// One handle per data block, in key order
    index: Vec<BlockHandle>,
    properties: TableProperties,
    /// Data blocks read from the file
    block_reads: AtomicU64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    pub fn open(path: &Path, id: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StrataError::Corruption(format!(
                "SSTable {} too short: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(StrataError::Storage(format!(
                "Invalid SSTable magic: expected STKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(StrataError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header, 6);

        // Read footer to locate index and properties
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let props_offset = read_u64(&footer, 8);
        let index_crc = read_u32(&footer, 16);
        let props_crc = read_u32(&footer, 20);

        let props_end = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || props_offset < index_offset || props_end < props_offset {
            return Err(StrataError::Corruption(format!(
                "SSTable {} has an invalid footer",
                path.display()
            )));
        }

        let index_data = read_region(&mut file, index_offset, props_offset - index_offset)?;
        if crc32fast::hash(&index_data) != index_crc {
            return Err(StrataError::Corruption(format!(
                "SSTable {} index checksum mismatch",
                path.display()
            )));
        }
        let index = parse_index(Bytes::from(index_data))?;

        let props_data = read_region(&mut file, props_offset, props_end - props_offset)?;
        if crc32fast::hash(&props_data) != props_crc {
            return Err(StrataError::Corruption(format!(
                "SSTable {} properties checksum mismatch",
                path.display()
            )));
        }
        let properties: TableProperties = bincode::deserialize(&props_data)?;

        if properties.entry_count != entry_count {
            return Err(StrataError::Corruption(format!(
                "SSTable {} header count {} disagrees with properties count {}",
                path.display(),
                entry_count,
                properties.entry_count
            )));
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            properties,
            block_reads: AtomicU64::new(0),
        })
    }

    /// Read and decode one data block from the file
    pub fn read_block(&self, block_no: usize, verify_checksum: bool) -> Result<DataBlock> {
        let handle = self.index.get(block_no).ok_or_else(|| {
            StrataError::Storage(format!(
                "block {} out of range for SSTable {}",
                block_no, self.id
            ))
        })?;

        let mut raw = vec![0u8; handle.size as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(handle.offset))?;
            file.read_exact(&mut raw)?;
        }
        self.block_reads.fetch_add(1, Ordering::Relaxed);

        DataBlock::decode(Bytes::from(raw), verify_checksum).map_err(|e| match e {
            StrataError::Corruption(msg) => StrataError::Corruption(format!(
                "SSTable {} block {}: {}",
                self.path.display(),
                block_no,
                msg
            )),
            other => other,
        })
    }

    /// First block whose last key is >= `user_key`
    pub fn find_block(&self, user_key: &[u8]) -> Option<usize> {
        let block_no = self
            .index
            .partition_point(|h| h.last_key.as_ref() < user_key);
        (block_no < self.index.len()).then_some(block_no)
    }

    pub fn block_handle(&self, block_no: usize) -> Option<&BlockHandle> {
        self.index.get(block_no)
    }

    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.properties.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        (self.entry_count() > 0).then_some(self.properties.min_key.as_ref())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        (self.entry_count() > 0).then_some(self.properties.max_key.as_ref())
    }

    pub fn max_seqno(&self) -> SeqNo {
        self.properties.max_seqno
    }

    pub fn range_tombstones(&self) -> &[RangeTombstone] {
        &self.properties.range_tombstones
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // No point entries
        }
    }

    /// Number of data blocks read from the file so far
    pub fn block_reads(&self) -> u64 {
        self.block_reads.load(Ordering::Relaxed)
    }
}

fn read_region(file: &mut File, offset: u64, len: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Parse index entries: [first_len(4)][last_len(4)][offset(8)][size(4)][first][last]
fn parse_index(data: Bytes) -> Result<Vec<BlockHandle>> {
    let mut index = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if pos + INDEX_ENTRY_HEADER_SIZE > data.len() {
            return Err(StrataError::Corruption(format!(
                "truncated index entry at offset {pos}"
            )));
        }
        let first_len = read_u32(&data, pos) as usize;
        let last_len = read_u32(&data, pos + 4) as usize;
        let offset = read_u64(&data, pos + 8);
        let size = read_u32(&data, pos + 16);
        pos += INDEX_ENTRY_HEADER_SIZE;

        if pos + first_len + last_len > data.len() {
            return Err(StrataError::Corruption(format!(
                "truncated index keys at offset {pos}"
            )));
        }
        let first_key = data.slice(pos..pos + first_len);
        pos += first_len;
        let last_key = data.slice(pos..pos + last_len);
        pos += last_len;

        index.push(BlockHandle {
            first_key,
            last_key,
            offset,
            size,
        });
    }
    Ok(index)
}
