//! Diskstore - durable keyed binary store
//!
//! A persistent mapping from string keys to opaque byte-string values,
//! one file per store. Every file opens with a superblock identifying
//! its magic, version, creation time and originating host; records land
//! in an append-only, checksummed log and become visible only once their
//! transaction's commit marker is durable. Mutual exclusion between
//! processes is cooperative over advisory file locks with a bounded,
//! fixed-backoff retry budget.
//!
//! # Example
//!
//! ```no_run
//! use diskstore::{Mode, Store, StoreConfig, TxnMode};
//!
//! let mut store = Store::create("telemetry.dat", StoreConfig::default())?;
//! store.begin(TxnMode::Write)?;
//! store.put("cpu.meta", b"8|0|0|60|processor load")?;
//! store.commit()?;
//! store.close()?;
//!
//! let mut store = Store::open("telemetry.dat", Mode::Read, StoreConfig::default())?;
//! let meta = store.get("cpu.meta")?;
//! # let _ = meta;
//! # Ok::<(), diskstore::StoreError>(())
//! ```

mod config;
mod error;
mod lock;
mod store;
mod superblock;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{Mode, Store, TxnMode};
pub use superblock::{short_hostname, Superblock, MAGIC, SUPERBLOCK_KEY, VERSION};
