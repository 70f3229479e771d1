//! Internal keys
//!
//! Every write is stamped with a sequence number. Internal keys order by user
//! key ascending, then sequence number descending, so the newest version of a
//! key is met first by any forward scan.

use std::cmp::Reverse;

use bytes::Bytes;

/// Monotonically increasing write stamp
pub type SeqNo = u64;

/// Largest sequence number; an internal key built with it sorts before every
/// other version of the same user key.
pub const MAX_SEQNO: SeqNo = u64::MAX;

/// A user key together with the sequence number of one of its versions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternalKey {
    pub user_key: Bytes,
    seqno: Reverse<SeqNo>,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Bytes>, seqno: SeqNo) -> Self {
        Self {
            user_key: user_key.into(),
            seqno: Reverse(seqno),
        }
    }

    /// Smallest internal key for `user_key`
    pub fn seek_key(user_key: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(user_key), MAX_SEQNO)
    }

    pub fn seqno(&self) -> SeqNo {
        self.seqno.0
    }
}

/// What a version of a key holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueEntry {
    /// A live value
    Value(Bytes),

    /// A point tombstone (deleted key)
    Tombstone,
}

impl ValueEntry {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, ValueEntry::Tombstone)
    }
}

/// One version of a key as stored in the memtable or an SSTable block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedEntry {
    pub key: InternalKey,
    pub value: ValueEntry,
}

impl VersionedEntry {
    pub fn user_key(&self) -> &[u8] {
        &self.key.user_key
    }

    pub fn seqno(&self) -> SeqNo {
        self.key.seqno()
    }
}
