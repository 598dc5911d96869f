//! Tabular - in-memory tables with a reversible text codec
//!
//! The data model underneath the ring-store engine: tables of textual
//! cells with insertion-ordered columns, labelled info rows (the `type`
//! row acting as a per-column ruler), a stateful row cursor, selection
//! views, and the scan/print codec that moves tables to and from
//! separated text with quoting that survives separators and newlines.
//!
//! # Example
//!
//! ```
//! use tabular::{ScanOptions, Table};
//!
//! let mut t = Table::with_columns(["host", "load"]);
//! t.add_row([("host", "ash"), ("load", "0.5")]);
//! t.add_info("type", [("host", "str"), ("load", "abs")]);
//!
//! let text = t.out_table('\t', true, true);
//!
//! let mut back = Table::new();
//! let opts = ScanOptions {
//!     seps: "\t".to_string(),
//!     multisep: false,
//!     has_names: true,
//!     has_info: true,
//! };
//! back.scan(&text, &opts).unwrap();
//! assert_eq!(back.cell(0, "host"), Some("ash"));
//! ```

mod error;
mod ordmap;
mod print;
mod scan;
mod table;
mod tableset;

pub use error::{ScanError, TableError};
pub use ordmap::OrdMap;
pub use print::{escape_token, quote_cell};
pub use scan::{scan_config_fields, scan_fields, ScanOptions};
pub use table::{Cell, Table, RULER_LABEL};
pub use tableset::{SelectOp, SortOrder, TableSet};
