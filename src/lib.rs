//! # StrataKV
//!
//! An embedded, LSM-structured key-value engine with a configurable read path:
//! - Per-request [`ReadOptions`]: checksum verification, cache fill policy,
//!   iteration bounds, prefix fencing, snapshots, cache-only reads and
//!   tailing iterators
//! - MVCC sequence numbers with point and range tombstones
//! - Block-structured SSTables with per-block CRC32 and a shared LRU block cache
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Engine::get / Engine::new_iterator (ReadOptions)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ snapshot → sequence number
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Tier Resolver                             │
//! │       (read tier, checksums, cache fill, tombstones)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │  MemTable   │ │ Block Cache │ │  SSTables   │
//!   │  (RwLock)   │ │    (LRU)    │ │ (AllTiers)  │
//!   └─────────────┘ └─────────────┘ └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod range_tombstone;
pub mod options;
pub mod snapshot;
pub mod memtable;
pub mod cache;
pub mod storage;
pub mod resolver;
pub mod iterator;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StrataError, Result};
pub use config::{Config, PrefixExtractor};
pub use engine::{Engine, EngineStats};
pub use iterator::{DbIterator, IterStatus};
pub use options::{IterBound, ReadOptions, ReadTier};
pub use resolver::ReadOutcome;
pub use snapshot::SnapshotId;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
