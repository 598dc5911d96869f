//! The driver capability interface.
//!
//! A driver claims a pseudo-URL prefix and opens channels; a channel is
//! one live handle with the uniform write/twrite/tell/read/tread
//! surface. Registration hands the router an owned driver keyed by its
//! prefix.

use crate::error::RouteError;
use crate::route::RouterConfig;
use tabular::Table;

/// Requested access when probing a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// What [`Channel::tell`] reports. Fields a channel kind cannot answer
/// are `-1`: file channels carry no sequence, ring channels no byte
/// size, null channels neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tell {
    /// Youngest sequence, or -1.
    pub seq: i64,
    /// Size in bytes, or -1.
    pub size: i64,
    /// Modification time in epoch seconds, or -1.
    pub mtime: i64,
}

impl Tell {
    /// A tell with every field inapplicable.
    pub const NONE: Tell = Tell {
        seq: -1,
        size: -1,
        mtime: -1,
    };
}

/// Everything a driver gets to open a channel.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    /// The full pseudo-URL.
    pub url: &'a str,
    /// The part after the prefix and colon.
    pub suffix: &'a str,
    /// Creation comment, when the location supports one.
    pub comment: &'a str,
    /// Password, when the location supports one. Core drivers carry it
    /// through untouched.
    pub password: Option<&'a str>,
    /// Creation size (ring slots); 0 forbids creating the location.
    pub keep: u32,
}

/// A registered family of channels, keyed by pseudo-URL prefix.
pub trait Driver {
    /// The prefix this driver answers to.
    fn prefix(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str;

    /// Called once at registration.
    fn init(&mut self, _config: &RouterConfig) {}

    /// Called at router teardown.
    fn fini(&mut self) {}

    /// Probes whether `suffix` could be opened with the given access.
    fn access(&self, suffix: &str, mode: Access) -> bool;

    /// Opens a channel.
    fn open(&self, req: &OpenRequest<'_>) -> Result<Box<dyn Channel>, RouteError>;
}

/// One open handle behind a route.
pub trait Channel {
    /// Writes raw bytes. Returns the number accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, RouteError>;

    /// Writes a table in the channel's native form.
    fn twrite(&mut self, tab: &Table) -> Result<(), RouteError>;

    /// Position and size of the location; see [`Tell`].
    fn tell(&mut self) -> Result<Tell, RouteError>;

    /// Reads buffers from `seq`/`offset`; the meaning of each is
    /// channel-specific (files use offset, rings use seq).
    fn read(&mut self, seq: i64, offset: i64) -> Result<Vec<Vec<u8>>, RouteError>;

    /// Reads a table from `seq`/`offset`.
    fn tread(&mut self, seq: i64, offset: i64) -> Result<Table, RouteError>;
}

/// Scans channel text into a table, accepting both headed body-only
/// streams and full canonical form (info rows present when a `--` line
/// is).
pub(crate) fn scan_stream_table(text: &str) -> Result<Table, RouteError> {
    let has_ruler = text.lines().any(|l| l == "--");
    let mut tab = Table::new();
    let opts = tabular::ScanOptions {
        seps: "\t".to_string(),
        multisep: false,
        has_names: true,
        has_info: has_ruler,
    };
    tab.scan(text, &opts)?;
    Ok(tab)
}
