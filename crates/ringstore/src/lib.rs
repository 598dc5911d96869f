//! Ringstore - circular buffers of timestamped samples over a durable
//! store
//!
//! The layering, leaves first: a [`TimeRing`] keeps `(seq, time, blob)`
//! samples under a ring's key space with wrap-around eviction; a
//! [`SpanTable`] maps runs of consecutive sequences to the one schema
//! header they share; a [`TableRing`] stores whole tables by splitting
//! them into body blobs and span-indexed headers; a [`RingStore`] adds
//! the human-level metadata: ring directory, header-hash dedup table,
//! per-sample index, store-wide counters. The [`conv`] module moves
//! rings to and from flat text.
//!
//! Every composite mutation (append plus eviction plus span purge plus
//! index upkeep) commits in a single write transaction on the
//! underlying store.
//!
//! # Example
//!
//! ```no_run
//! use diskstore::StoreConfig;
//! use ringstore::RingStore;
//! use tabular::Table;
//!
//! let mut rs = RingStore::create(
//!     "telemetry.dat", "r.cpu60", "Processor load", "sampled each minute",
//!     1440, 60, StoreConfig::default(),
//! )?;
//!
//! let mut sample = Table::with_columns(["user", "sys", "idle"]);
//! sample.add_row([("user", "12.0"), ("sys", "3.1"), ("idle", "84.9")]);
//! rs.put(&sample)?;
//!
//! rs.goto_oldest()?;
//! let back = rs.get(true)?.expect("just written");
//! assert_eq!(back.cell(0, "user"), Some("12.0"));
//! # Ok::<(), ringstore::RingError>(())
//! ```

mod conv;
mod error;
mod ring;
mod rs;
mod span;
mod tabring;

pub use conv::{
    export_ring, export_to_file, import_file, import_text, ExportOptions, ImportOptions,
    DUR_COL, HOST_COL, RING_COL, SEQ_COL, TIME_COL,
};
pub use error::RingError;
pub use ring::{now, RingStat, Sample, Seconds, TimeRing};
pub use rs::{RingDir, RingStore};
pub use span::{
    headers_by_seq_range, ls_rings, name_root, name_roots, read_ring_blocks,
    rings_by_root_and_time, Hunt, Span, SpanTable, SPAN_PREFIX,
};
pub use tabring::{header_text, TableRing};
