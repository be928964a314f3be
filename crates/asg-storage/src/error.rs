//! Storage error types for asg-storage.
//!
//! [`StorageError`] covers every failure mode of the binary codec: I/O,
//! header validation, structurally impossible data, and graph errors raised
//! while the loader rebuilds nodes and edges through the arena API.

use asg_core::AsgError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A graph operation failed outside of loading (e.g. hashing a dead node).
    #[error("graph error: {0}")]
    Graph(#[from] AsgError),

    /// The stream does not start with a valid header.
    #[error("bad header: {reason}")]
    BadHeader { reason: String },

    /// The stream was written by an incompatible codec version.
    #[error("binary version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The stream contains structurally impossible data.
    #[error("corrupt graph: {reason}")]
    CorruptGraph { reason: String },

    /// The stream was written for a different node-kind catalogue.
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
}

impl StorageError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        StorageError::CorruptGraph { reason: reason.into() }
    }

    /// Maps a truncated stream to `CorruptGraph`; other I/O errors pass through.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            StorageError::corrupt("unexpected end of data")
        } else {
            StorageError::Io(err)
        }
    }
}
