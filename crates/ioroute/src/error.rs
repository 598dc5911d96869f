//! Error types for routing operations.

use thiserror::Error;

/// Errors that can occur opening and driving channels.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The pseudo-URL names no registered driver.
    #[error("unknown driver in '{0}' (format is [driver:]location)")]
    UnknownDriver(String),

    /// The pseudo-URL does not fit the driver's address grammar.
    #[error("bad address '{url}': {reason}")]
    BadAddress {
        /// The offending pseudo-URL.
        url: String,
        /// What the driver expected.
        reason: &'static str,
    },

    /// The location does not exist and creation was not permitted
    /// (`keep` of 0).
    #[error("'{0}' does not exist and keep=0 forbids creation")]
    NoSuchLocation(String),

    /// The channel does not support the requested operation.
    #[error("operation not supported on '{0}' channels")]
    Unsupported(&'static str),

    /// A template expansion met an unknown `%` token.
    #[error("unknown expansion token '%{0}'")]
    BadToken(char),

    /// The pending buffer could not be drained to the driver.
    #[error("cannot write to '{url}', {kept} bytes kept in the buffer")]
    FlushFailed {
        /// The route's pseudo-URL.
        url: String,
        /// Bytes still pending.
        kept: usize,
    },

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failure in the ring layer behind a ring channel.
    #[error(transparent)]
    Ring(#[from] ringstore::RingError),

    /// Failure in the store layer.
    #[error(transparent)]
    Store(#[from] diskstore::StoreError),

    /// Failure scanning or rendering a table.
    #[error(transparent)]
    Table(#[from] tabular::TableError),
}
