//! Data block codec

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StrataError};
use crate::key::{InternalKey, SeqNo, ValueEntry, VersionedEntry};

use super::{BLOCK_TRAILER_SIZE, ENTRY_HEADER_SIZE, TOMBSTONE_MARKER};

/// A decoded data block: versions in internal key order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    entries: Vec<VersionedEntry>,
}

impl DataBlock {
    /// Append one encoded entry to `buf`
    pub(crate) fn encode_entry(
        buf: &mut BytesMut,
        key: &[u8],
        seqno: SeqNo,
        value: Option<&[u8]>,
    ) -> Result<()> {
        let key_len = encoded_len(key.len(), "key")?;
        let val_len = match value {
            Some(v) => encoded_len(v.len(), "value")?,
            None => TOMBSTONE_MARKER,
        };
        buf.put_u32_le(key_len);
        buf.put_u64_le(seqno);
        buf.put_u32_le(val_len);
        buf.put_slice(key);
        if let Some(v) = value {
            buf.put_slice(v);
        }
        Ok(())
    }

    /// Decode a raw block (entries followed by the CRC32 trailer).
    ///
    /// With `verify_checksum` a CRC mismatch is reported as corruption.
    /// Structural damage is corruption either way.
    pub fn decode(raw: Bytes, verify_checksum: bool) -> Result<Self> {
        if raw.len() < BLOCK_TRAILER_SIZE {
            return Err(StrataError::Corruption(format!(
                "data block too short: {} bytes",
                raw.len()
            )));
        }
        let payload_len = raw.len() - BLOCK_TRAILER_SIZE;

        if verify_checksum {
            let stored = read_u32(&raw, payload_len);
            let actual = crc32fast::hash(&raw[..payload_len]);
            if stored != actual {
                return Err(StrataError::Corruption(format!(
                    "data block checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
                )));
            }
        }

        let payload = raw.slice(..payload_len);
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < payload.len() {
            if pos + ENTRY_HEADER_SIZE > payload.len() {
                return Err(StrataError::Corruption(format!(
                    "truncated entry header at block offset {pos}"
                )));
            }
            let key_len = read_u32(&payload, pos) as usize;
            let seqno = read_u64(&payload, pos + 4);
            let val_len = read_u32(&payload, pos + 12);
            pos += ENTRY_HEADER_SIZE;

            if pos + key_len > payload.len() {
                return Err(StrataError::Corruption(format!(
                    "truncated key at block offset {pos}"
                )));
            }
            let key = payload.slice(pos..pos + key_len);
            pos += key_len;

            let value = if val_len == TOMBSTONE_MARKER {
                ValueEntry::Tombstone
            } else {
                let val_len = val_len as usize;
                if pos + val_len > payload.len() {
                    return Err(StrataError::Corruption(format!(
                        "truncated value at block offset {pos}"
                    )));
                }
                let value = payload.slice(pos..pos + val_len);
                pos += val_len;
                ValueEntry::Value(value)
            };

            entries.push(VersionedEntry {
                key: InternalKey::new(key, seqno),
                value,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[VersionedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the first version of the first user key >= `user_key`
    pub fn seek(&self, user_key: &[u8]) -> usize {
        self.entries.partition_point(|e| e.user_key() < user_key)
    }

    /// Newest version of `user_key` visible at `snapshot_seqno`
    pub fn get(&self, user_key: &[u8], snapshot_seqno: SeqNo) -> Option<(SeqNo, &ValueEntry)> {
        self.entries[self.seek(user_key)..]
            .iter()
            .take_while(|e| e.user_key() == user_key)
            .find(|e| e.seqno() <= snapshot_seqno)
            .map(|e| (e.seqno(), &e.value))
    }
}

/// Length of a key or value as stored in its `u32` length field.
///
/// `u32::MAX` is the tombstone marker, so the largest storable length is one
/// below it.
pub(crate) fn encoded_len(len: usize, what: &str) -> Result<u32> {
    match u32::try_from(len) {
        Ok(n) if n != TOMBSTONE_MARKER => Ok(n),
        _ => Err(StrataError::InvalidArgument(format!(
            "{what} of {len} bytes exceeds the maximum encodable length"
        ))),
    }
}

pub(crate) fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(word)
}

pub(crate) fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_le_bytes(word)
}
