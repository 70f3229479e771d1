//! Per-tier cursors merged by [`super::DbIterator`].

use std::collections::VecDeque;
use std::ops::Bound;

use bytes::Bytes;

use crate::error::Result;
use crate::key::VersionedEntry;
use crate::memtable::MemTable;
use crate::storage::{BlockLoader, CursorPosition, TableCursor};

/// Versions fetched from a live memtable per lookup
const LIVE_BATCH: usize = 32;

/// Cursor over a bounded copy of the memtable taken when the view was built
pub(crate) struct MemCursor {
    entries: Vec<VersionedEntry>,
    pos: usize,
}

impl MemCursor {
    pub(crate) fn new(entries: Vec<VersionedEntry>) -> Self {
        let pos = entries.len();
        Self { entries, pos }
    }

    fn seek(&mut self, target: Option<&[u8]>) {
        self.pos = match target {
            Some(t) => self.entries.partition_point(|e| e.user_key() < t),
            None => 0,
        };
    }

    fn position(&self, limit: Option<&[u8]>) -> CursorPosition {
        match self.entries.get(self.pos) {
            Some(e) if limit.map_or(true, |l| e.user_key() < l) => CursorPosition::Ready,
            _ => CursorPosition::Exhausted,
        }
    }
}

/// Cursor reading the live memtable in small batches.
///
/// Used by tailing iterators. Batches end on user-key boundaries, so after a
/// key is fully consumed `from` points just past it and a refetch picks up
/// writes published since the batch was taken. A batch read at a different
/// epoch than the view's is discarded; the iterator rebuilds its view then.
pub(crate) struct LiveMemCursor<'a> {
    memtable: &'a MemTable,
    epoch: u64,
    upper: Option<Bytes>,
    from: Bound<Bytes>,
    batch: VecDeque<VersionedEntry>,
    exhausted: bool,
}

impl<'a> LiveMemCursor<'a> {
    pub(crate) fn new(memtable: &'a MemTable, epoch: u64, upper: Option<Bytes>) -> Self {
        Self {
            memtable,
            epoch,
            upper,
            from: Bound::Unbounded,
            batch: VecDeque::new(),
            // Unpositioned until the first seek
            exhausted: true,
        }
    }

    fn seek(&mut self, target: Option<&[u8]>) {
        self.from = match target {
            Some(t) => Bound::Included(Bytes::copy_from_slice(t)),
            None => Bound::Unbounded,
        };
        self.invalidate();
    }

    /// Drop the buffered batch; the next access refetches from `from`
    fn invalidate(&mut self) {
        self.batch.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) {
        let from = match &self.from {
            Bound::Included(k) => Bound::Included(k.as_ref()),
            Bound::Excluded(k) => Bound::Excluded(k.as_ref()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let (epoch, entries) = self
            .memtable
            .scan_batch(from, self.upper.as_deref(), LIVE_BATCH);
        if epoch != self.epoch || entries.is_empty() {
            self.exhausted = true;
            return;
        }
        self.batch.extend(entries);
    }

    fn position(&mut self, limit: Option<&[u8]>) -> CursorPosition {
        if self.batch.is_empty() && !self.exhausted {
            self.fill();
        }
        match self.batch.front() {
            Some(e) if limit.map_or(true, |l| e.user_key() < l) => CursorPosition::Ready,
            _ => CursorPosition::Exhausted,
        }
    }

    fn advance(&mut self) {
        let Some(popped) = self.batch.pop_front() else {
            return;
        };
        let same_key_next = self
            .batch
            .front()
            .is_some_and(|next| next.key.user_key == popped.key.user_key);
        if !same_key_next {
            self.from = Bound::Excluded(popped.key.user_key);
        }
    }
}

/// One source of versions, newest tier first in the merge order
pub(crate) enum Cursor<'a> {
    Mem(MemCursor),
    LiveMem(LiveMemCursor<'a>),
    Table(TableCursor),
}

impl Cursor<'_> {
    pub(crate) fn seek(&mut self, target: Option<&[u8]>) {
        match self {
            Cursor::Mem(c) => c.seek(target),
            Cursor::LiveMem(c) => c.seek(target),
            Cursor::Table(c) => c.seek(target),
        }
    }

    pub(crate) fn position<L>(&mut self, loader: &L, limit: Option<&[u8]>) -> Result<CursorPosition>
    where
        L: BlockLoader + ?Sized,
    {
        match self {
            Cursor::Mem(c) => Ok(c.position(limit)),
            Cursor::LiveMem(c) => Ok(c.position(limit)),
            Cursor::Table(c) => c.position(loader, limit),
        }
    }

    pub(crate) fn current(&self) -> Option<&VersionedEntry> {
        match self {
            Cursor::Mem(c) => c.entries.get(c.pos),
            Cursor::LiveMem(c) => c.batch.front(),
            Cursor::Table(c) => c.current(),
        }
    }

    pub(crate) fn advance(&mut self) {
        match self {
            Cursor::Mem(c) => c.pos += 1,
            Cursor::LiveMem(c) => c.advance(),
            Cursor::Table(c) => c.advance(),
        }
    }

    /// Forget buffered memtable versions so newer writes become visible
    pub(crate) fn invalidate(&mut self) {
        if let Cursor::LiveMem(c) = self {
            c.invalidate();
        }
    }
}
