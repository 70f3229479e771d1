//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Keep every version of a key so snapshots stay readable
//! - Hold range tombstones until they are flushed
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and bounded scans
//!
//! ## Data Structure Choice
//! BTreeMap keyed by `InternalKey` wrapped in RwLock:
//! - Ordered keys (required for SSTable generation)
//! - Newest version of a key first (seqno descending)

mod table;

pub use table::MemTable;
