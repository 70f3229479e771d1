//! Snapshot registry
//!
//! Snapshots are handles into a registry owned by the engine. Read options
//! store the handle only; resolving a released handle is an error.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, StrataError};
use crate::key::SeqNo;

/// Opaque handle to a pinned point-in-time view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub u64);

/// Tracks the latest published sequence number and pinned snapshots.
#[derive(Debug)]
pub struct SnapshotRegistry {
    next_id: AtomicU64,
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    latest_seqno: SeqNo,
    pinned: BTreeMap<u64, SeqNo>,
}

impl SnapshotRegistry {
    pub fn new(latest_seqno: SeqNo) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(RegistryInner {
                latest_seqno,
                pinned: BTreeMap::new(),
            }),
        }
    }

    /// Make writes up to `seqno` visible to readers
    pub fn publish(&self, seqno: SeqNo) {
        let mut guard = self.inner.lock();
        guard.latest_seqno = guard.latest_seqno.max(seqno);
    }

    pub fn latest_seqno(&self) -> SeqNo {
        self.inner.lock().latest_seqno
    }

    /// Pin the latest published sequence number
    pub fn create(&self) -> SnapshotId {
        let id = SnapshotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.inner.lock();
        let seqno = guard.latest_seqno;
        guard.pinned.insert(id.0, seqno);
        id
    }

    /// Returns false if the snapshot was not live
    pub fn release(&self, id: SnapshotId) -> bool {
        self.inner.lock().pinned.remove(&id.0).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().pinned.len()
    }

    /// Sequence number a read should observe
    pub fn resolve(&self, id: Option<SnapshotId>) -> Result<SeqNo> {
        let guard = self.inner.lock();
        match id {
            None => Ok(guard.latest_seqno),
            Some(snapshot) => guard
                .pinned
                .get(&snapshot.0)
                .copied()
                .ok_or(StrataError::UnknownSnapshot(snapshot.0)),
        }
    }
}
