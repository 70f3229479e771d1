//! Storage tier resolution
//!
//! Decides, for one read, which tiers are consulted and in what order:
//! memtable, then block cache, then SSTable files. The read plan derived from
//! [`ReadOptions`] controls whether files may be touched, whether fetched
//! blocks are checksum-verified and cached, and whether range tombstones
//! apply.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::{BlockCache, BlockCacheKey};
use crate::error::Result;
use crate::key::{SeqNo, ValueEntry, VersionedEntry};
use crate::memtable::MemTable;
use crate::options::{ReadOptions, ReadTier};
use crate::range_tombstone::RangeTombstone;
use crate::storage::{BlockFetch, BlockLoader, SSTableReader, StorageManager};

/// Result of a point lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(Bytes),
    NotFound,
    /// The read tier kept the lookup from reaching data it needed
    Incomplete,
}

impl ReadOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ReadOutcome::Found(_))
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, ReadOutcome::Incomplete)
    }

    pub fn value(&self) -> Option<&Bytes> {
        match self {
            ReadOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Bytes> {
        match self {
            ReadOutcome::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// The parts of [`ReadOptions`] the resolver acts on, with the snapshot
/// already resolved to a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    pub snapshot_seqno: SeqNo,
    pub read_tier: ReadTier,
    pub verify_checksums: bool,
    pub fill_cache: bool,
    pub ignore_range_deletions: bool,
}

impl ReadPlan {
    pub fn new(opts: &ReadOptions<'_>, snapshot_seqno: SeqNo) -> Self {
        Self {
            snapshot_seqno,
            read_tier: opts.read_tier(),
            verify_checksums: opts.verify_checksums(),
            fill_cache: opts.fill_cache(),
            ignore_range_deletions: opts.ignore_range_deletions(),
        }
    }
}

/// How an iterator sees the memtable
pub(crate) enum MemView<'a> {
    /// Bounded copy taken when the view was built
    Copied(Vec<VersionedEntry>),
    /// The live table, valid while its epoch is unchanged
    Live { memtable: &'a MemTable, epoch: u64 },
}

/// Everything an iterator needs from the tiers
pub(crate) struct ReadView<'a> {
    pub memtable: MemView<'a>,
    pub tables: Vec<Arc<SSTableReader>>,
    pub range_tombstones: Vec<RangeTombstone>,
}

/// Layered lookup over the engine's tiers for one read plan
#[derive(Clone, Copy)]
pub struct TierResolver<'a> {
    memtable: &'a MemTable,
    storage: &'a StorageManager,
    cache: &'a BlockCache,
    plan: ReadPlan,
}

impl<'a> TierResolver<'a> {
    pub fn new(
        memtable: &'a MemTable,
        storage: &'a StorageManager,
        cache: &'a BlockCache,
        plan: ReadPlan,
    ) -> Self {
        Self {
            memtable,
            storage,
            cache,
            plan,
        }
    }

    pub fn plan(&self) -> &ReadPlan {
        &self.plan
    }

    /// Same tiers and flags, different snapshot
    pub fn at_seqno(mut self, snapshot_seqno: SeqNo) -> Self {
        self.plan.snapshot_seqno = snapshot_seqno;
        self
    }

    /// Point lookup
    pub fn get(&self, key: &[u8]) -> Result<ReadOutcome> {
        let snapshot = self.plan.snapshot_seqno;

        // Memtable before the table list: a flush publishes its table before
        // clearing the memtable.
        let mem_hit = self.memtable.get(key, snapshot);
        let mem_tombstones = self.memtable.range_tombstones();
        let tables = self.storage.tables();

        let deleted_at = if self.plan.ignore_range_deletions {
            None
        } else {
            mem_tombstones
                .iter()
                .chain(tables.iter().flat_map(|t| t.range_tombstones()))
                .filter(|t| t.seqno <= snapshot)
                .filter(|t| t.start_key.as_ref() <= key && key < t.end_key.as_ref())
                .map(|t| t.seqno)
                .max()
        };

        if let Some((seqno, entry)) = mem_hit {
            tracing::trace!(tier = "memtable", seqno, "point lookup hit");
            return Ok(Self::visible(seqno, entry, deleted_at));
        }

        for table in &tables {
            if !table.might_contain(key) {
                continue;
            }
            let Some(block_no) = table.find_block(key) else {
                continue;
            };
            let block = match self.load_block(table, block_no)? {
                BlockFetch::Resident(block) => block,
                BlockFetch::NotResident => {
                    tracing::trace!(table = table.id(), block_no, "block not resident");
                    return Ok(ReadOutcome::Incomplete);
                }
            };
            if let Some((seqno, entry)) = block.get(key, snapshot) {
                return Ok(Self::visible(seqno, entry.clone(), deleted_at));
            }
        }

        Ok(ReadOutcome::NotFound)
    }

    /// Capture what an iterator reads: the memtable (copied within
    /// `[lower, upper)`, or live when `live` is set), the table list and the
    /// range tombstones. Tombstones newer than the snapshot are kept; the
    /// iterator checks them against its current sequence number.
    pub(crate) fn view(
        &self,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        live: bool,
    ) -> ReadView<'a> {
        // Same order as `get`: memtable first, then the table list
        let memtable = if live {
            MemView::Live {
                memtable: self.memtable,
                epoch: self.memtable.epoch(),
            }
        } else {
            MemView::Copied(self.memtable.range(lower, upper))
        };
        let mem_tombstones = self.memtable.range_tombstones();
        let tables = self.storage.tables();

        let range_tombstones = if self.plan.ignore_range_deletions {
            Vec::new()
        } else {
            mem_tombstones
                .into_iter()
                .chain(tables.iter().flat_map(|t| t.range_tombstones().iter().cloned()))
                .collect()
        };

        ReadView {
            memtable,
            tables,
            range_tombstones,
        }
    }

    /// Epoch of the memtable, compared against a live view's epoch
    pub(crate) fn memtable_epoch(&self) -> u64 {
        self.memtable.epoch()
    }

    fn visible(seqno: SeqNo, entry: ValueEntry, deleted_at: Option<SeqNo>) -> ReadOutcome {
        match entry {
            ValueEntry::Tombstone => ReadOutcome::NotFound,
            ValueEntry::Value(_) if deleted_at.is_some_and(|t| t > seqno) => ReadOutcome::NotFound,
            ValueEntry::Value(v) => ReadOutcome::Found(v),
        }
    }
}

impl BlockLoader for TierResolver<'_> {
    /// Block cache first; SSTable file only when the read tier allows it.
    ///
    /// A checksum-verifying read only accepts a cached block whose CRC was
    /// checked when it was read. Otherwise the block is read again from the
    /// file, or reported as not resident for `CacheOnly`.
    fn load_block(&self, table: &SSTableReader, block_no: usize) -> Result<BlockFetch> {
        let key = BlockCacheKey::new(table.id(), block_no);
        if let Some(cached) = self.cache.get(&key) {
            if cached.verified || !self.plan.verify_checksums {
                return Ok(BlockFetch::Resident(cached.block));
            }
            tracing::trace!(table = table.id(), block_no, "cached block was never verified");
        }

        if self.plan.read_tier == ReadTier::CacheOnly {
            return Ok(BlockFetch::NotResident);
        }

        let verify = self.plan.verify_checksums;
        let block = match table.read_block(block_no, verify) {
            Ok(block) => Arc::new(block),
            Err(e) => {
                if e.is_corruption() {
                    tracing::warn!(table = table.id(), block_no, error = %e, "corrupt data block");
                }
                return Err(e);
            }
        };
        if self.plan.fill_cache {
            self.cache.insert(key, Arc::clone(&block), verify);
        }
        Ok(BlockFetch::Resident(block))
    }
}
