//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::key::{InternalKey, SeqNo, ValueEntry, VersionedEntry};
use crate::range_tombstone::RangeTombstone;

/// Per-version bookkeeping charged on top of key and value bytes
const SEQNO_OVERHEAD: usize = std::mem::size_of::<SeqNo>();

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<InternalKey, ValueEntry>>,
    range_tombstones: RwLock<Vec<RangeTombstone>>,
    /// Approximate size in bytes
    size: AtomicUsize,
    /// Number of point versions (values and tombstones)
    entry_count: AtomicUsize,
    /// Bumped when the table is cleared or gains a range tombstone
    epoch: AtomicU64,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            range_tombstones: RwLock::new(Vec::new()),
            size: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Insert a value version. Returns the new approximate size.
    pub fn put(&self, key: &[u8], value: &[u8], seqno: SeqNo) -> usize {
        let charge = key.len() + value.len() + SEQNO_OVERHEAD;
        self.insert(
            InternalKey::new(Bytes::copy_from_slice(key), seqno),
            ValueEntry::Value(Bytes::copy_from_slice(value)),
            charge,
        )
    }

    /// Insert a point tombstone. Returns the new approximate size.
    pub fn delete(&self, key: &[u8], seqno: SeqNo) -> usize {
        let charge = key.len() + SEQNO_OVERHEAD;
        self.insert(
            InternalKey::new(Bytes::copy_from_slice(key), seqno),
            ValueEntry::Tombstone,
            charge,
        )
    }

    /// Record a range tombstone over `[start, end)`. Returns the new approximate size.
    pub fn delete_range(&self, start: &[u8], end: &[u8], seqno: SeqNo) -> usize {
        let tombstone = RangeTombstone::new(
            Bytes::copy_from_slice(start),
            Bytes::copy_from_slice(end),
            seqno,
        );
        let charge = start.len() + end.len() + SEQNO_OVERHEAD;
        self.range_tombstones.write().push(tombstone);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.size.fetch_add(charge, Ordering::SeqCst) + charge
    }

    fn insert(&self, key: InternalKey, value: ValueEntry, charge: usize) -> usize {
        let replaced = self.data.write().insert(key, value);
        if replaced.is_none() {
            self.entry_count.fetch_add(1, Ordering::SeqCst);
        }
        self.size.fetch_add(charge, Ordering::SeqCst) + charge
    }

    /// Newest version of `key` visible at `snapshot_seqno`
    pub fn get(&self, key: &[u8], snapshot_seqno: SeqNo) -> Option<(SeqNo, ValueEntry)> {
        let start = InternalKey::new(Bytes::copy_from_slice(key), snapshot_seqno);
        let data = self.data.read();
        data.range(start..)
            .next()
            .filter(|(k, _)| k.user_key.as_ref() == key)
            .map(|(k, v)| (k.seqno(), v.clone()))
    }

    /// All versions of user keys in `[lower, upper)`, in internal key order
    pub fn range(&self, lower: Option<&[u8]>, upper: Option<&[u8]>) -> Vec<VersionedEntry> {
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo >= hi {
                return Vec::new();
            }
        }
        let start = match lower {
            Some(lo) => Bound::Included(InternalKey::seek_key(lo)),
            None => Bound::Unbounded,
        };
        let end = match upper {
            Some(hi) => Bound::Excluded(InternalKey::seek_key(hi)),
            None => Bound::Unbounded,
        };

        self.data
            .read()
            .range((start, end))
            .map(|(k, v)| VersionedEntry {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }

    /// Up to `max` versions starting at `from`, below `upper`, together with
    /// the epoch they were read at.
    ///
    /// The batch is extended past `max` until the user key changes, so it
    /// always ends on a user-key boundary.
    pub fn scan_batch(
        &self,
        from: Bound<&[u8]>,
        upper: Option<&[u8]>,
        max: usize,
    ) -> (u64, Vec<VersionedEntry>) {
        let data = self.data.read();
        let epoch = self.epoch.load(Ordering::SeqCst);

        let start = match from {
            Bound::Included(k) | Bound::Excluded(k) if upper.is_some_and(|hi| k >= hi) => {
                return (epoch, Vec::new());
            }
            Bound::Included(k) => Bound::Included(InternalKey::seek_key(k)),
            // Seqno 0 sorts after every other version of `k`
            Bound::Excluded(k) => Bound::Excluded(InternalKey::new(Bytes::copy_from_slice(k), 0)),
            Bound::Unbounded => Bound::Unbounded,
        };
        let end = match upper {
            Some(hi) => Bound::Excluded(InternalKey::seek_key(hi)),
            None => Bound::Unbounded,
        };

        let mut batch: Vec<VersionedEntry> = Vec::new();
        for (k, v) in data.range((start, end)) {
            if batch.len() >= max && batch.last().is_some_and(|last| last.key.user_key != k.user_key) {
                break;
            }
            batch.push(VersionedEntry {
                key: k.clone(),
                value: v.clone(),
            });
        }
        (epoch, batch)
    }

    /// Current epoch; a changed epoch means cached views of this table are stale
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Get all entries in sorted order (for flush)
    pub fn iter(&self) -> Vec<VersionedEntry> {
        self.range(None, None)
    }

    pub fn range_tombstones(&self) -> Vec<RangeTombstone> {
        self.range_tombstones.read().clone()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (point versions)
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::SeqCst)
    }

    /// Check if the memtable holds nothing to flush
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0 && self.range_tombstones.read().is_empty()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        let mut tombstones = self.range_tombstones.write();
        data.clear();
        tombstones.clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.size.store(0, Ordering::SeqCst);
        self.entry_count.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
