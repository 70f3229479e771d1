//! Iteration bounds

use bytes::Bytes;

/// An immutable iteration fence.
///
/// The caller's bytes are copied on construction, so the source buffer may be
/// mutated or dropped afterwards. A bound is borrowed by [`super::ReadOptions`]
/// and must outlive it; dropping the options never drops the bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IterBound {
    bytes: Bytes,
}

impl IterBound {
    /// Copy `bytes` into a new bound
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(bytes.as_ref()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cheap handle to the owned bytes
    pub(crate) fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl AsRef<[u8]> for IterBound {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
