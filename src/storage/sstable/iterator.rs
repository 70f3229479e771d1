//! SSTable Cursor
//!
//! Forward iteration over the versions stored in an SSTable, one data block at
//! a time. Blocks are obtained through a [`BlockLoader`], which decides whether
//! the block may come from the cache, the file, or neither.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::key::VersionedEntry;

use super::{DataBlock, SSTableReader};

/// Outcome of asking for a data block
#[derive(Debug, Clone)]
pub enum BlockFetch {
    Resident(Arc<DataBlock>),
    /// The block exists but the read may not fetch it
    NotResident,
}

/// Supplies data blocks to cursors
pub trait BlockLoader {
    fn load_block(&self, table: &SSTableReader, block_no: usize) -> Result<BlockFetch>;
}

/// Where a cursor stands after positioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    /// `current()` returns an entry
    Ready,
    Exhausted,
    /// The next entry lives in a block the loader would not provide
    NotResident,
}

/// Cursor over the entries of an SSTable in internal key order
pub struct TableCursor {
    table: Arc<SSTableReader>,
    block_no: usize,
    block: Option<Arc<DataBlock>>,
    pos: usize,
    /// Seek target applied once the block is loaded
    target: Option<Bytes>,
}

impl TableCursor {
    /// Create an unpositioned cursor; call `seek` before use
    pub fn new(table: Arc<SSTableReader>) -> Self {
        let block_no = table.block_count();
        Self {
            table,
            block_no,
            block: None,
            pos: 0,
            target: None,
        }
    }

    /// Position before the first version of the first user key >= `target`
    /// (or at the first entry when `target` is `None`). Loading is deferred
    /// to `position`.
    pub fn seek(&mut self, target: Option<&[u8]>) {
        self.block = None;
        self.pos = 0;
        match target {
            Some(t) => {
                self.block_no = self
                    .table
                    .find_block(t)
                    .unwrap_or_else(|| self.table.block_count());
                self.target = Some(Bytes::copy_from_slice(t));
            }
            None => {
                self.block_no = 0;
                self.target = None;
            }
        }
    }

    /// Make `current()` valid, loading blocks as needed.
    ///
    /// Blocks starting at or beyond `limit` are never loaded.
    pub fn position<L>(&mut self, loader: &L, limit: Option<&[u8]>) -> Result<CursorPosition>
    where
        L: BlockLoader + ?Sized,
    {
        loop {
            if self.block.is_none() {
                let Some(handle) = self.table.block_handle(self.block_no) else {
                    return Ok(CursorPosition::Exhausted);
                };
                if limit.is_some_and(|l| handle.first_key.as_ref() >= l) {
                    return Ok(CursorPosition::Exhausted);
                }
                match loader.load_block(&self.table, self.block_no)? {
                    BlockFetch::Resident(block) => {
                        self.pos = match self.target.take() {
                            Some(t) => block.seek(&t),
                            None => 0,
                        };
                        self.block = Some(block);
                    }
                    BlockFetch::NotResident => return Ok(CursorPosition::NotResident),
                }
            }

            if let Some(block) = &self.block {
                if self.pos < block.len() {
                    return Ok(CursorPosition::Ready);
                }
            }

            // Block consumed: move on to the next one
            self.block = None;
            self.block_no += 1;
            self.pos = 0;
            self.target = None;
        }
    }

    pub fn current(&self) -> Option<&VersionedEntry> {
        self.block.as_ref()?.entries().get(self.pos)
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }
}
