//! Error types for ring operations.

use thiserror::Error;

/// Errors that can occur operating on rings and their indexes.
#[derive(Debug, Error)]
pub enum RingError {
    /// The named ring does not exist in the store.
    #[error("ring not found: {0}")]
    NotFound(String),

    /// A ring with this name already exists.
    #[error("ring already exists: {0}")]
    AlreadyExists(String),

    /// Cursor movement outside `[oldest, youngest + 1]`.
    #[error("sequence {seq} outside [{oldest}, {}]", .youngest + 1)]
    CursorOutOfRange {
        /// The requested sequence.
        seq: u64,
        /// Oldest live sequence.
        oldest: u64,
        /// Youngest live sequence.
        youngest: u64,
    },

    /// A new span would overlap a recorded one.
    #[error("span [{from}, {to}] overlaps an existing span")]
    SpanOverlap {
        /// Proposed starting sequence.
        from: u64,
        /// Proposed ending sequence.
        to: u64,
    },

    /// The span to extend is not recorded.
    #[error("span [{from}, {to}] not found")]
    SpanNotFound {
        /// Recorded starting sequence.
        from: u64,
        /// Recorded ending sequence.
        to: u64,
    },

    /// A live sample has no covering span, or a record failed to parse.
    #[error("ring record corrupt: {0}")]
    Corrupt(String),

    /// An import declared a column the input does not carry.
    #[error("declared column missing from input: {0}")]
    MissingColumn(String),

    /// Failure in the underlying key/value store.
    #[error(transparent)]
    Store(#[from] diskstore::StoreError),

    /// Failure in the tabular layer.
    #[error(transparent)]
    Table(#[from] tabular::TableError),
}
