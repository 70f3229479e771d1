//! Error types for StrataKV
//!
//! Provides a unified error type for all operations.
//!
//! Incomplete data is not an error: a read restricted to the cache tier that
//! cannot answer reports `ReadOutcome::Incomplete` instead.

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataKV operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    /// Checksum mismatch or malformed on-disk data. Never retried.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown or released snapshot: {0}")]
    UnknownSnapshot(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StrataError {
    /// True for checksum and format failures.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StrataError::Corruption(_))
    }

    /// True for errors caused by the caller's read or engine configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, StrataError::Config(_) | StrataError::UnknownSnapshot(_))
    }
}

impl From<bincode::Error> for StrataError {
    fn from(err: bincode::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}
