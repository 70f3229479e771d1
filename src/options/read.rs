//! Read options
//!
//! Per-request parameters for [`crate::Engine::get`] and
//! [`crate::Engine::new_iterator`].

use crate::error::{Result, StrataError};
use crate::snapshot::SnapshotId;

use super::IterBound;

/// Which storage tiers a read may consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadTier {
    /// Memtable, block cache and SSTable files
    #[default]
    AllTiers,

    /// Memtable and block cache only. Data that is not resident is reported
    /// as incomplete instead of being read from disk.
    CacheOnly,
}

impl TryFrom<u32> for ReadTier {
    type Error = StrataError;

    /// Raw tier values: 0 = all tiers, 1 = block cache tier
    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ReadTier::AllTiers),
            1 => Ok(ReadTier::CacheOnly),
            other => Err(StrataError::Config(format!("invalid read tier: {other}"))),
        }
    }
}

/// Options for a single read or iterator.
///
/// Every field is optional; unset fields take the documented default. Bounds
/// are borrowed, the snapshot is a handle into the engine's registry, so
/// dropping a `ReadOptions` releases neither.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions<'a> {
    verify_checksums: Option<bool>,
    fill_cache: Option<bool>,
    iterate_lower_bound: Option<&'a IterBound>,
    iterate_upper_bound: Option<&'a IterBound>,
    prefix_same_as_start: Option<bool>,
    ignore_range_deletions: Option<bool>,
    snapshot: Option<SnapshotId>,
    read_tier: Option<ReadTier>,
    tailing: Option<bool>,
}

impl<'a> ReadOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Verify block checksums of data read from SSTable files.
    /// Default: false
    pub fn set_verify_checksums(&mut self, value: bool) {
        self.verify_checksums = Some(value);
    }

    /// Insert blocks read from SSTable files into the block cache.
    /// Callers may wish to turn this off for bulk scans.
    /// Default: true
    pub fn set_fill_cache(&mut self, value: bool) {
        self.fill_cache = Some(value);
    }

    /// Inclusive lower fence for iteration
    pub fn set_iterate_lower_bound(&mut self, bound: &'a IterBound) {
        self.iterate_lower_bound = Some(bound);
    }

    /// Exclusive upper fence for iteration
    pub fn set_iterate_upper_bound(&mut self, bound: &'a IterBound) {
        self.iterate_upper_bound = Some(bound);
    }

    /// Only surface keys sharing the seek key's prefix.
    /// Default: false
    pub fn set_prefix_same_as_start(&mut self, value: bool) {
        self.prefix_same_as_start = Some(value);
    }

    /// Skip range-tombstone filtering.
    /// Default: false
    pub fn set_ignore_range_deletions(&mut self, value: bool) {
        self.ignore_range_deletions = Some(value);
    }

    /// Pin the read to a snapshot. The snapshot must belong to the engine
    /// being read and must not have been released. `None` reads the latest
    /// state.
    pub fn set_snapshot(&mut self, snapshot: Option<SnapshotId>) {
        self.snapshot = snapshot;
    }

    /// Default: [`ReadTier::AllTiers`]
    pub fn set_read_tier(&mut self, tier: ReadTier) {
        self.read_tier = Some(tier);
    }

    /// Request an iterator that also returns entries written after its
    /// creation. Cannot be combined with a snapshot.
    /// Default: false
    pub fn set_tailing(&mut self, value: bool) {
        self.tailing = Some(value);
    }

    // =========================================================================
    // Accessors (effective values)
    // =========================================================================

    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums.unwrap_or(false)
    }

    pub fn fill_cache(&self) -> bool {
        self.fill_cache.unwrap_or(true)
    }

    pub fn iterate_lower_bound(&self) -> Option<&'a IterBound> {
        self.iterate_lower_bound
    }

    pub fn iterate_upper_bound(&self) -> Option<&'a IterBound> {
        self.iterate_upper_bound
    }

    pub fn prefix_same_as_start(&self) -> bool {
        self.prefix_same_as_start.unwrap_or(false)
    }

    pub fn ignore_range_deletions(&self) -> bool {
        self.ignore_range_deletions.unwrap_or(false)
    }

    pub fn snapshot(&self) -> Option<SnapshotId> {
        self.snapshot
    }

    pub fn read_tier(&self) -> ReadTier {
        self.read_tier.unwrap_or_default()
    }

    pub fn tailing(&self) -> bool {
        self.tailing.unwrap_or(false)
    }

    /// True when no field has been set
    pub fn is_default(&self) -> bool {
        self.verify_checksums.is_none()
            && self.fill_cache.is_none()
            && self.iterate_lower_bound.is_none()
            && self.iterate_upper_bound.is_none()
            && self.prefix_same_as_start.is_none()
            && self.ignore_range_deletions.is_none()
            && self.snapshot.is_none()
            && self.read_tier.is_none()
            && self.tailing.is_none()
    }

    /// Check field combinations the engine refuses to guess about
    pub fn validate(&self) -> Result<()> {
        if self.tailing() {
            if let Some(snapshot) = self.snapshot {
                return Err(StrataError::Config(format!(
                    "tailing iterator cannot be pinned to snapshot {}",
                    snapshot.0
                )));
            }
        }
        Ok(())
    }
}
