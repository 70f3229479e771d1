//! Database iterator
//!
//! [`DbIterator`] merges the memtable with every SSTable into one ascending
//! stream of live keys, applying the read options it was created with:
//!
//! - only the newest version at or below the snapshot sequence number is
//!   returned, and point or range tombstones hide it
//! - keys outside `[lower, upper)` are never returned, and blocks starting at
//!   or past the upper bound are never loaded
//! - `prefix_same_as_start` fences the scan to the seek key's prefix
//! - a `CacheOnly` iterator stops with [`IterStatus::Incomplete`] at the first
//!   block that is not resident
//! - a tailing iterator reads the live memtable, so writes published during a
//!   scan show up ahead of its position without copying the memtable again;
//!   it rebuilds its view only when the memtable is flushed or gains a range
//!   tombstone, and then continues after the last key it returned

mod cursor;

use bytes::Bytes;

use crate::config::PrefixExtractor;
use crate::error::Result;
use crate::key::{SeqNo, ValueEntry};
use crate::options::{IterBound, ReadOptions};
use crate::range_tombstone::RangeTombstone;
use crate::resolver::{MemView, TierResolver};
use crate::snapshot::SnapshotRegistry;
use crate::storage::{CursorPosition, TableCursor};

use cursor::{Cursor, LiveMemCursor, MemCursor};

/// Health of an iterator after it stops yielding entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterStatus {
    #[default]
    Ok,
    /// A block needed to continue was not in the block cache
    Incomplete,
    /// An error was returned; iteration ended
    Failed,
}

#[derive(Debug, Clone)]
enum SeekTarget {
    First,
    Key(Bytes),
}

/// Forward iterator over live key-value pairs.
///
/// Borrows the engine and the bounds referenced by its [`ReadOptions`]. A new
/// iterator is positioned as if [`seek_to_first`](Self::seek_to_first) had
/// been called.
pub struct DbIterator<'a> {
    resolver: TierResolver<'a>,
    snapshots: &'a SnapshotRegistry,
    opts: ReadOptions<'a>,
    prefix_extractor: Option<PrefixExtractor>,

    cursors: Vec<Cursor<'a>>,
    range_tombstones: Vec<RangeTombstone>,
    /// Memtable epoch of a live view; `None` for a copied view
    view_epoch: Option<u64>,

    lower: Option<Bytes>,
    upper: Option<Bytes>,
    /// Prefix fence for the current seek
    prefix: Option<Bytes>,
    /// Take the prefix from the first key returned
    prefix_from_first_key: bool,
    /// Exclusive end of the scan: min(upper bound, prefix successor)
    limit: Option<Bytes>,

    pending_seek: Option<SeekTarget>,
    /// Where the current seek started, after clamping to the lower bound
    start: Option<Bytes>,
    /// Keys at or below this were already returned before a view rebuild
    resume_after: Option<Bytes>,
    last_key: Option<Bytes>,

    status: IterStatus,
    done: bool,
}

impl<'a> DbIterator<'a> {
    pub(crate) fn new(
        resolver: TierResolver<'a>,
        snapshots: &'a SnapshotRegistry,
        opts: ReadOptions<'a>,
        prefix_extractor: Option<PrefixExtractor>,
    ) -> Self {
        let mut iter = Self {
            resolver,
            snapshots,
            opts,
            prefix_extractor,
            cursors: Vec::new(),
            range_tombstones: Vec::new(),
            view_epoch: None,
            lower: opts.iterate_lower_bound().map(IterBound::to_bytes),
            upper: opts.iterate_upper_bound().map(IterBound::to_bytes),
            prefix: None,
            prefix_from_first_key: false,
            limit: None,
            pending_seek: Some(SeekTarget::First),
            start: None,
            resume_after: None,
            last_key: None,
            status: IterStatus::Ok,
            done: false,
        };
        iter.build_view();
        iter
    }

    /// Position at the first key at or above the lower bound
    pub fn seek_to_first(&mut self) {
        self.pending_seek = Some(SeekTarget::First);
    }

    /// Position at the first key `>= key`, clamped to the lower bound
    pub fn seek(&mut self, key: impl AsRef<[u8]>) {
        self.pending_seek = Some(SeekTarget::Key(Bytes::copy_from_slice(key.as_ref())));
    }

    pub fn status(&self) -> IterStatus {
        self.status
    }

    pub fn is_incomplete(&self) -> bool {
        self.status == IterStatus::Incomplete
    }

    /// Sequence number the iterator currently reads at
    pub fn snapshot_seqno(&self) -> SeqNo {
        self.resolver.plan().snapshot_seqno
    }

    fn build_view(&mut self) {
        let view = self.resolver.view(
            self.lower.as_deref(),
            self.upper.as_deref(),
            self.opts.tailing(),
        );

        let mut cursors = Vec::with_capacity(view.tables.len() + 1);
        match view.memtable {
            MemView::Copied(entries) => {
                self.view_epoch = None;
                cursors.push(Cursor::Mem(MemCursor::new(entries)));
            }
            MemView::Live { memtable, epoch } => {
                self.view_epoch = Some(epoch);
                cursors.push(Cursor::LiveMem(LiveMemCursor::new(
                    memtable,
                    epoch,
                    self.upper.clone(),
                )));
            }
        }
        cursors.extend(
            view.tables
                .into_iter()
                .map(|t| Cursor::Table(TableCursor::new(t))),
        );
        self.cursors = cursors;
        self.range_tombstones = view.range_tombstones;
    }

    /// The live memtable was flushed or gained a range tombstone since the
    /// view was built
    fn view_is_stale(&self) -> bool {
        self.view_epoch
            .is_some_and(|epoch| epoch != self.resolver.memtable_epoch())
    }

    /// Rebuild the view at the latest sequence number and continue after the
    /// last key returned, or from the seek start if nothing was returned yet.
    fn rebuild_and_resume(&mut self) {
        let latest = self.snapshots.latest_seqno();
        tracing::trace!(from = self.snapshot_seqno(), to = latest, "tailing iterator rebuild");
        self.resolver = self.resolver.at_seqno(latest);
        self.build_view();

        self.done = false;
        match self.last_key.clone() {
            Some(key) => {
                self.resume_after = Some(key.clone());
                self.reposition(Some(key));
            }
            None => self.reposition(self.start.clone()),
        }
    }

    /// Bring a tailing iterator up to the latest published writes. Without a
    /// flush or range deletion this only moves the read sequence number and
    /// drops the memtable batch; the cursors keep their positions.
    fn catch_up(&mut self) {
        if !self.opts.tailing() {
            return;
        }
        if self.view_is_stale() {
            self.rebuild_and_resume();
            return;
        }
        let latest = self.snapshots.latest_seqno();
        if latest != self.snapshot_seqno() {
            self.resolver = self.resolver.at_seqno(latest);
            for cursor in &mut self.cursors {
                cursor.invalidate();
            }
            self.done = false;
        }
    }

    fn apply_seek(&mut self, target: SeekTarget) {
        if self.opts.tailing() {
            self.resolver = self.resolver.at_seqno(self.snapshots.latest_seqno());
            if self.view_is_stale() {
                self.build_view();
            }
        }

        self.status = IterStatus::Ok;
        self.done = false;
        self.resume_after = None;
        self.last_key = None;
        self.prefix = None;
        self.prefix_from_first_key = false;

        let start = match &target {
            SeekTarget::First => self.lower.clone(),
            SeekTarget::Key(key) => match &self.lower {
                Some(lower) if lower > key => Some(lower.clone()),
                _ => Some(key.clone()),
            },
        };

        if self.opts.prefix_same_as_start() {
            if let Some(extractor) = self.prefix_extractor {
                let source = match target {
                    SeekTarget::Key(key) => Some(key),
                    SeekTarget::First => self.lower.clone(),
                };
                match source {
                    Some(key) => {
                        self.prefix = extractor.prefix(&key).map(Bytes::copy_from_slice);
                    }
                    None => self.prefix_from_first_key = true,
                }
            }
        }

        self.limit = self.compute_limit();
        self.start = start;
        self.reposition(self.start.clone());
    }

    fn reposition(&mut self, target: Option<Bytes>) {
        for cursor in &mut self.cursors {
            cursor.seek(target.as_deref());
        }
    }

    fn compute_limit(&self) -> Option<Bytes> {
        let prefix_end = self.prefix.as_deref().and_then(prefix_successor);
        match (self.upper.clone(), prefix_end) {
            (Some(upper), Some(prefix_end)) => Some(upper.min(prefix_end)),
            (upper, prefix_end) => upper.or(prefix_end),
        }
    }

    fn stop(&mut self, status: IterStatus) -> Option<(Bytes, Bytes)> {
        self.status = status;
        self.done = true;
        None
    }

    fn next_entry(&mut self) -> Result<Option<(Bytes, Bytes)>> {
        if let Some(target) = self.pending_seek.take() {
            self.apply_seek(target);
        } else if self.status == IterStatus::Ok {
            self.catch_up();
        }

        if self.done {
            return Ok(None);
        }

        loop {
            let snapshot = self.snapshot_seqno();
            let limit = self.limit.clone();

            // Smallest user key across all cursors
            let mut smallest: Option<Bytes> = None;
            for cursor in &mut self.cursors {
                match cursor.position(&self.resolver, limit.as_deref())? {
                    CursorPosition::Ready => {}
                    CursorPosition::Exhausted => continue,
                    CursorPosition::NotResident => {
                        tracing::debug!("iterator stopped at a non-resident block");
                        self.status = IterStatus::Incomplete;
                        self.done = true;
                        return Ok(None);
                    }
                }
                if let Some(entry) = cursor.current() {
                    if smallest.as_ref().map_or(true, |s| entry.user_key() < s.as_ref()) {
                        smallest = Some(entry.key.user_key.clone());
                    }
                }
            }

            let past_end = match &smallest {
                None => true,
                Some(key) => {
                    limit.as_ref().is_some_and(|l| key >= l)
                        || self.prefix.as_ref().is_some_and(|p| !key.starts_with(p))
                }
            };
            if past_end {
                // A flush may have emptied the live memtable mid-scan
                if self.view_is_stale() {
                    self.rebuild_and_resume();
                    continue;
                }
                return Ok(self.stop(IterStatus::Ok));
            }
            let Some(user_key) = smallest else {
                return Ok(self.stop(IterStatus::Ok));
            };

            // Drain every version of this key; keep the newest visible one
            let mut newest: Option<(SeqNo, ValueEntry)> = None;
            for cursor in &mut self.cursors {
                loop {
                    match cursor.position(&self.resolver, limit.as_deref())? {
                        CursorPosition::Ready => {}
                        CursorPosition::Exhausted => break,
                        CursorPosition::NotResident => {
                            self.status = IterStatus::Incomplete;
                            self.done = true;
                            return Ok(None);
                        }
                    }
                    let Some(entry) = cursor.current() else {
                        break;
                    };
                    if entry.user_key() != user_key.as_ref() {
                        break;
                    }
                    let seqno = entry.seqno();
                    if seqno <= snapshot && newest.as_ref().map_or(true, |(s, _)| seqno > *s) {
                        newest = Some((seqno, entry.value.clone()));
                    }
                    cursor.advance();
                }
            }

            if self.view_is_stale() {
                self.rebuild_and_resume();
                continue;
            }

            if self.resume_after.as_ref().is_some_and(|r| user_key <= *r) {
                continue;
            }
            if self.lower.as_ref().is_some_and(|l| user_key < *l) {
                continue;
            }
            let Some((seqno, ValueEntry::Value(value))) = newest else {
                continue;
            };
            if self
                .range_tombstones
                .iter()
                .any(|t| t.covers(&user_key, seqno, snapshot))
            {
                continue;
            }

            if self.prefix_from_first_key {
                self.prefix_from_first_key = false;
                if let Some(extractor) = self.prefix_extractor {
                    self.prefix = extractor.prefix(&user_key).map(Bytes::copy_from_slice);
                    self.limit = self.compute_limit();
                }
            }

            self.last_key = Some(user_key.clone());
            return Ok(Some((user_key, value)));
        }
    }
}

impl Iterator for DbIterator<'_> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(kv)) => Some(Ok(kv)),
            Ok(None) => None,
            Err(e) => {
                self.status = IterStatus::Failed;
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for DbIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbIterator")
            .field("snapshot_seqno", &self.snapshot_seqno())
            .field("status", &self.status)
            .field("tiers", &self.cursors.len())
            .finish()
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None` when
/// no such key exists (all bytes are 0xFF).
fn prefix_successor(prefix: &[u8]) -> Option<Bytes> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return Some(Bytes::from(end));
        }
        end.pop();
    }
    None
}
