//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur operating on a store file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file exists but does not carry a store superblock.
    #[error("{0}: wrong magic, not a store file")]
    BadMagic(String),

    /// The superblock version does not match this implementation.
    #[error("{path}: store version {found}, want {want}")]
    VersionMismatch {
        /// Store file path.
        path: String,
        /// Version found in the superblock.
        found: u32,
        /// Version this build reads and writes.
        want: u32,
    },

    /// The advisory lock could not be taken within the retry budget.
    #[error("lock unavailable after {attempts} attempts")]
    LockUnavailable {
        /// Number of acquisition attempts made.
        attempts: u32,
    },

    /// The store file already exists.
    #[error("store already exists: {0}")]
    AlreadyExists(String),

    /// The store file does not exist.
    #[error("store not found: {0}")]
    NotFound(String),

    /// A record or the superblock is structurally damaged.
    #[error("store corrupt: {0}")]
    Corrupt(String),

    /// The handle is in the wrong state for the call, e.g. a write
    /// inside a read transaction.
    #[error("invalid handle state: {0}")]
    InvalidState(&'static str),

    /// The operating system refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A search pattern failed to compile.
    #[error("bad search pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

impl StoreError {
    /// Returns `true` when retrying the operation later may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockUnavailable { .. })
    }
}
