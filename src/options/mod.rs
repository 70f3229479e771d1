//! Read Options Module
//!
//! Per-request configuration of the read path.
//!
//! ## Ownership
//! - [`IterBound`] owns a private copy of its bytes
//! - [`ReadOptions`] borrows bounds and stores a [`crate::SnapshotId`] handle
//! - Neither bounds nor snapshots are released when the options are dropped

mod bound;
mod read;

pub use bound::IterBound;
pub use read::{ReadOptions, ReadTier};
