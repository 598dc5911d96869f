//! Error types for table operations and text scanning.

use thiserror::Error;

/// Errors from table manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The named column does not exist in this table.
    #[error("no such column: {0}")]
    NoSuchColumn(String),

    /// A column with this name already exists.
    #[error("column already exists: {0}")]
    DuplicateColumn(String),

    /// The row id is not present in this table.
    #[error("no such row: {0}")]
    NoSuchRow(u64),

    /// A cursor operation was attempted with the cursor beyond end.
    #[error("row cursor is beyond end")]
    NoCurrentRow,

    /// Text could not be scanned into a table.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A selection expression could not be parsed.
    #[error("bad selection: {0}")]
    BadSelection(String),
}

/// Errors from scanning text into a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// A quoted run was opened but never closed before end of buffer.
    #[error("unterminated quote starting on line {0}")]
    UnterminatedQuote(usize),

    /// The caller declared info rows but no `--` terminator was found.
    #[error("info rows declared but no `--` terminator found")]
    MissingRuler,

    /// The caller declared a column-name header but the buffer is empty.
    #[error("column-name header declared but input has no lines")]
    MissingHeader,
}
