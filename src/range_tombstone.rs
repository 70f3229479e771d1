use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::key::SeqNo;

/// Deletes every key in `[start_key, end_key)` written before `seqno`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTombstone {
    pub start_key: Bytes,
    pub end_key: Bytes,
    pub seqno: SeqNo,
}

impl RangeTombstone {
    pub fn new(start_key: Bytes, end_key: Bytes, seqno: SeqNo) -> Self {
        Self {
            start_key,
            end_key,
            seqno,
        }
    }

    /// Whether the version of `key` written at `key_seqno` is deleted for a
    /// reader at `snapshot_seqno`.
    pub fn covers(&self, key: &[u8], key_seqno: SeqNo, snapshot_seqno: SeqNo) -> bool {
        self.seqno <= snapshot_seqno
            && key_seqno < self.seqno
            && self.start_key.as_ref() <= key
            && key < self.end_key.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.start_key.as_ref() < self.end_key.as_ref()
    }
}
