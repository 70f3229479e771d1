//! SSTable Builder
//!
//! Writes sorted versioned entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StrataError};
use crate::key::{InternalKey, SeqNo};
use crate::range_tombstone::RangeTombstone;

use super::block::encoded_len;
use super::{
    BlockHandle, DataBlock, SSTable, TableProperties, BLOCK_TRAILER_SIZE, HEADER_SIZE,
    INDEX_ENTRY_HEADER_SIZE, MAGIC, VERSION,
};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Target block size in bytes
    block_size: usize,
    /// Number of point entries written
    entry_count: u64,
    /// Current write position (for block handles)
    current_offset: u64,
    /// Entries of the block being filled
    block_buf: BytesMut,
    block_first_key: Option<Bytes>,
    block_last_key: Option<Bytes>,
    /// One handle per finished data block
    index: Vec<BlockHandle>,
    /// Last internal key added (ordering check)
    last_key: Option<InternalKey>,
    /// Track min/max keys for metadata
    min_key: Option<Bytes>,
    max_key: Option<Bytes>,
    max_seqno: SeqNo,
    range_tombstones: Vec<RangeTombstone>,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()`/`add_tombstone()` in internal
    /// key order, then `finish()` to write index, properties and footer.
    pub fn new(path: &Path, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            block_size: block_size.max(1),
            entry_count: 0,
            current_offset: HEADER_SIZE,
            block_buf: BytesMut::new(),
            block_first_key: None,
            block_last_key: None,
            index: Vec::new(),
            last_key: None,
            min_key: None,
            max_key: None,
            max_seqno: 0,
            range_tombstones: Vec::new(),
        })
    }

    /// Add a value version (must be called in internal key order)
    pub fn add(&mut self, key: &[u8], seqno: SeqNo, value: &[u8]) -> Result<()> {
        self.write_entry(key, seqno, Some(value))
    }

    /// Add a point tombstone (must be called in internal key order)
    pub fn add_tombstone(&mut self, key: &[u8], seqno: SeqNo) -> Result<()> {
        self.write_entry(key, seqno, None)
    }

    /// Add a range tombstone; stored in the properties block
    pub fn add_range_tombstone(&mut self, tombstone: RangeTombstone) -> Result<()> {
        if !tombstone.is_valid() {
            return Err(StrataError::InvalidArgument(
                "range tombstone start must be below end".to_string(),
            ));
        }
        self.max_seqno = self.max_seqno.max(tombstone.seqno);
        self.range_tombstones.push(tombstone);
        Ok(())
    }

    /// Internal: buffer an entry (value=None means tombstone)
    fn write_entry(&mut self, key: &[u8], seqno: SeqNo, value: Option<&[u8]>) -> Result<()> {
        let internal = InternalKey::new(Bytes::copy_from_slice(key), seqno);
        if let Some(last) = &self.last_key {
            if internal <= *last {
                return Err(StrataError::Storage(format!(
                    "entries added out of order: {:?}@{} after {:?}@{}",
                    internal.user_key,
                    seqno,
                    last.user_key,
                    last.seqno()
                )));
            }
        }

        // Cut blocks only between user keys so all versions of a key share a block
        let new_user_key = self.block_last_key.as_deref() != Some(key);
        if new_user_key && self.block_buf.len() >= self.block_size {
            self.finish_block()?;
        }

        DataBlock::encode_entry(&mut self.block_buf, key, seqno, value)?;

        if self.block_first_key.is_none() {
            self.block_first_key = Some(internal.user_key.clone());
        }
        self.block_last_key = Some(internal.user_key.clone());

        // Track min/max keys
        if self.min_key.is_none() {
            self.min_key = Some(internal.user_key.clone());
        }
        self.max_key = Some(internal.user_key.clone());
        self.max_seqno = self.max_seqno.max(seqno);

        self.last_key = Some(internal);
        self.entry_count += 1;

        Ok(())
    }

    /// Write the buffered block followed by its CRC32
    fn finish_block(&mut self) -> Result<()> {
        if self.block_buf.is_empty() {
            return Ok(());
        }

        let crc = crc32fast::hash(&self.block_buf);
        self.writer.write_all(&self.block_buf)?;
        self.writer.write_all(&crc.to_le_bytes())?;

        let size = self.block_buf.len() + BLOCK_TRAILER_SIZE;
        let encoded_size = u32::try_from(size).map_err(|_| {
            StrataError::Storage(format!("data block of {size} bytes is too large"))
        })?;
        self.index.push(BlockHandle {
            first_key: self.block_first_key.take().unwrap_or_default(),
            last_key: self.block_last_key.take().unwrap_or_default(),
            offset: self.current_offset,
            size: encoded_size,
        });

        self.current_offset += size as u64;
        self.block_buf.clear();
        Ok(())
    }

    /// Finish building: write index block, properties, footer and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        self.finish_block()?;

        // Index block: [first_len(4)][last_len(4)][offset(8)][size(4)][first][last]
        let index_offset = self.current_offset;
        let mut index_buf = BytesMut::new();
        for handle in &self.index {
            index_buf.reserve(
                INDEX_ENTRY_HEADER_SIZE + handle.first_key.len() + handle.last_key.len(),
            );
            index_buf.put_u32_le(encoded_len(handle.first_key.len(), "key")?);
            index_buf.put_u32_le(encoded_len(handle.last_key.len(), "key")?);
            index_buf.put_u64_le(handle.offset);
            index_buf.put_u32_le(handle.size);
            index_buf.put_slice(&handle.first_key);
            index_buf.put_slice(&handle.last_key);
        }
        let index_crc = crc32fast::hash(&index_buf);
        self.writer.write_all(&index_buf)?;

        // Properties block
        let props_offset = index_offset + index_buf.len() as u64;
        let properties = TableProperties {
            entry_count: self.entry_count,
            min_key: self.min_key.clone().unwrap_or_default(),
            max_key: self.max_key.clone().unwrap_or_default(),
            max_seqno: self.max_seqno,
            range_tombstones: std::mem::take(&mut self.range_tombstones),
        };
        let props_buf = bincode::serialize(&properties)?;
        let props_crc = crc32fast::hash(&props_buf);
        self.writer.write_all(&props_buf)?;

        // Footer
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&props_offset.to_le_bytes())?;
        self.writer.write_all(&index_crc.to_le_bytes())?;
        self.writer.write_all(&props_crc.to_le_bytes())?;

        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self.writer.into_inner().map_err(|e| {
            StrataError::Storage(format!("Failed to flush SSTable: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entry_count,
            blocks = self.index.len(),
            file_size,
            "SSTable written"
        );

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            block_count: self.index.len(),
            min_key: properties.min_key,
            max_key: properties.max_key,
            max_seqno: properties.max_seqno,
            file_size,
        })
    }
}
