//! Conversion between rings and flat text.
//!
//! Export reads every sample of a ring between optional time bounds
//! into one table, dresses it with the synthetic `_time`, `_seq`,
//! `_host`, `_ring` and `_dur` columns on request, and renders the
//! canonical text form. Import scans a text table, batches consecutive
//! rows sharing a sequence (or a time when no sequence is carried) into
//! samples and appends them to a ring, creating it if absent.

use crate::error::RingError;
use crate::ring::{now, Seconds, TimeRing};
use crate::span::SpanTable;
use crate::tabring::TableRing;
use chrono::TimeZone;
use diskstore::{short_hostname, StoreConfig};
use tabular::{ScanOptions, Table};

/// Synthetic column carrying the sample time.
pub const TIME_COL: &str = "_time";
/// Synthetic column carrying the sample sequence.
pub const SEQ_COL: &str = "_seq";
/// Synthetic column carrying the short host name.
pub const HOST_COL: &str = "_host";
/// Synthetic column carrying the ring name stem.
pub const RING_COL: &str = "_ring";
/// Synthetic column carrying the duration from the ring name.
pub const DUR_COL: &str = "_dur";

/// Shape of an export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Column separator of the output text.
    pub separator: char,
    /// Emit the column-name header line.
    pub with_names: bool,
    /// Emit info rows and the `--` ruler.
    pub with_ruler: bool,
    /// Keep the `_time` column.
    pub with_time: bool,
    /// Render times with this strftime-style format instead of epoch
    /// seconds.
    pub time_format: Option<String>,
    /// Keep the `_seq` column.
    pub with_seq: bool,
    /// Add a `_host` column with the unqualified host name.
    pub with_host: bool,
    /// Add a `_ring` column with the ring name stem.
    pub with_ring: bool,
    /// Add a `_dur` column from the trailing digits of the ring name.
    pub with_dur: bool,
    /// Drop samples before this time.
    pub from: Option<Seconds>,
    /// Drop samples after this time.
    pub to: Option<Seconds>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: '\t',
            with_names: true,
            with_ruler: true,
            with_time: true,
            time_format: None,
            with_seq: true,
            with_host: false,
            with_ring: false,
            with_dur: false,
            from: None,
            to: None,
        }
    }
}

/// Shape of an import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Column separator characters of the input text.
    pub separator: String,
    /// Treat runs of separators as one delimiter.
    pub multisep: bool,
    /// The input starts with a column-name header.
    pub with_names: bool,
    /// Info rows terminated by `--` follow the header.
    pub with_ruler: bool,
    /// The input declares a `_time` column; its absence aborts.
    pub has_time: bool,
    /// The input declares a `_seq` column; its absence aborts.
    pub has_seq: bool,
    /// Drop a `_host` column if present.
    pub has_host: bool,
    /// Drop a `_ring` column if present.
    pub has_ring: bool,
    /// Drop a `_dur` column if present.
    pub has_dur: bool,
    /// Slots for a ring created by the import (0 = unbounded).
    pub slots: u32,
    /// Description for a ring created by the import.
    pub description: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            separator: "\t".to_string(),
            multisep: false,
            with_names: true,
            with_ruler: true,
            has_time: true,
            has_seq: true,
            has_host: false,
            has_ring: false,
            has_dur: false,
            slots: 0,
            description: String::new(),
        }
    }
}

/// The name stem of a ring: everything before the first digit.
fn ring_stem(ring: &str) -> &str {
    let cut = ring
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(ring.len());
    &ring[..cut]
}

/// The duration encoded in the ring name's trailing digits, `0` when
/// the name carries none.
fn ring_duration_str(ring: &str) -> &str {
    match ring.find(|c: char| c.is_ascii_digit()) {
        Some(cut) => &ring[cut..],
        None => "0",
    }
}

/// Exports a ring to text. Table rings export their full schema; plain
/// rings export `_seq`, `_time` and a `value` column.
pub fn export_ring(
    path: impl AsRef<std::path::Path>,
    ring_name: &str,
    opts: &ExportOptions,
    config: StoreConfig,
) -> Result<String, RingError> {
    let mut ring = TimeRing::open(path, ring_name, config)?;

    let has_spans = SpanTable::read(&mut ring)?.is_some();
    let mut tab = if has_spans {
        let mut tabring = TableRing::from_ring(ring);
        let tab = tabring.get_all()?.unwrap_or_default();
        tabring.close()?;
        tab
    } else {
        ring.goto_oldest()?;
        let tab = ring.mget_t(usize::MAX)?;
        ring.close()?;
        tab
    };

    // time bounds
    if opts.from.is_some() || opts.to.is_some() {
        tab.first();
        while !tab.beyond_end() {
            let t: Option<Seconds> = tab
                .current_cell(TIME_COL)
                .and_then(|c| c.parse().ok());
            let keep = match t {
                Some(t) => {
                    opts.from.map_or(true, |from| t >= from)
                        && opts.to.map_or(true, |to| t <= to)
                }
                None => true,
            };
            if keep {
                tab.next();
            } else {
                tab.remove_current_row()?;
            }
        }
    }

    // dress or strip the synthetic columns
    if opts.with_time {
        if let Some(fmt) = &opts.time_format {
            let ids = tab.row_ids();
            for id in ids {
                let Some(t) = tab.cell(id, TIME_COL).and_then(|c| c.parse::<i64>().ok())
                else {
                    continue;
                };
                if let Some(dt) = chrono::Local.timestamp_opt(t, 0).single() {
                    tab.replace_cell(id, TIME_COL, Some(dt.format(fmt).to_string()))?;
                }
            }
        }
    } else if tab.has_column(TIME_COL) {
        tab.remove_column(TIME_COL)?;
    }
    if !opts.with_seq && tab.has_column(SEQ_COL) {
        tab.remove_column(SEQ_COL)?;
    }
    if opts.with_host {
        tab.add_column(HOST_COL, Some(short_hostname()))?;
    }
    if opts.with_ring {
        tab.add_column(RING_COL, Some(ring_stem(ring_name).to_string()))?;
    }
    if opts.with_dur {
        tab.add_column(DUR_COL, Some(ring_duration_str(ring_name).to_string()))?;
    }

    Ok(tab.out_table(opts.separator, opts.with_names, opts.with_ruler))
}

/// Exports a ring straight to a file.
pub fn export_to_file(
    path: impl AsRef<std::path::Path>,
    ring_name: &str,
    outfile: impl AsRef<std::path::Path>,
    opts: &ExportOptions,
    config: StoreConfig,
) -> Result<usize, RingError> {
    let text = export_ring(path, ring_name, opts, config)?;
    std::fs::write(outfile, &text).map_err(diskstore::StoreError::from)?;
    Ok(text.len())
}

/// Imports a text table into a ring, creating the ring when absent.
/// Returns the number of samples appended.
pub fn import_text(
    path: impl AsRef<std::path::Path>,
    ring_name: &str,
    text: &str,
    opts: &ImportOptions,
    config: StoreConfig,
) -> Result<usize, RingError> {
    let mut tab = Table::new();
    let scan_opts = ScanOptions {
        seps: opts.separator.clone(),
        multisep: opts.multisep,
        has_names: opts.with_names,
        has_info: opts.with_ruler,
    };
    tab.scan(text, &scan_opts)?;

    if opts.has_time && !tab.has_column(TIME_COL) {
        return Err(RingError::MissingColumn(TIME_COL.to_string()));
    }
    if opts.has_seq && !tab.has_column(SEQ_COL) {
        return Err(RingError::MissingColumn(SEQ_COL.to_string()));
    }

    let store = crate::ring::open_or_create_store(path.as_ref(), config)?;
    let mut ring = match TableRing::open_in(store, ring_name) {
        Ok(ring) => ring,
        Err(RingError::NotFound(_)) => {
            // recreate the store handle consumed by the failed open
            let store = crate::ring::open_or_create_store(path.as_ref(), config)?;
            TableRing::create_in(store, ring_name, &opts.description, opts.slots, 0)?
        }
        Err(e) => return Err(e),
    };

    // schema of the per-sample batches: data columns only
    let mut schema = Table::from_schema(&tab);
    for col in [SEQ_COL, TIME_COL] {
        if schema.has_column(col) {
            schema.remove_column(col)?;
        }
    }
    for (flag, col) in [
        (opts.has_host, HOST_COL),
        (opts.has_ring, RING_COL),
        (opts.has_dur, DUR_COL),
    ] {
        if flag && schema.has_column(col) {
            schema.remove_column(col)?;
        }
    }

    let mut samples = 0usize;
    let mut batch = Table::from_schema(&schema);
    let mut batch_key: Option<String> = None;
    let mut batch_time: Option<Seconds> = None;

    let flush = |ring: &mut TableRing,
                 batch: &mut Table,
                 time: Option<Seconds>,
                 samples: &mut usize|
     -> Result<(), RingError> {
        if batch.nrows() == 0 {
            return Ok(());
        }
        // columns the batch never filled belong to other schemas in the
        // input; dropping them reproduces the source span structure
        let mut sample = batch.clone();
        let names: Vec<String> = sample
            .column_names()
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        for name in names {
            let all_absent = sample
                .row_ids()
                .into_iter()
                .all(|id| sample.cell(id, &name).is_none());
            if all_absent && sample.ncols() > 1 {
                sample.remove_column(&name)?;
            }
        }
        ring.put_with_time(&sample, time.unwrap_or_else(now))?;
        *samples += 1;
        *batch = Table::from_schema(batch);
        Ok(())
    };

    for id in tab.row_ids() {
        // batch by sequence, else by time, else one row per sample
        let key = if opts.has_seq {
            tab.cell(id, SEQ_COL).map(str::to_string)
        } else if opts.has_time {
            tab.cell(id, TIME_COL).map(str::to_string)
        } else {
            None
        };

        let new_batch = match (&batch_key, &key) {
            (Some(prev), Some(next)) => prev != next,
            _ => true,
        };
        if new_batch {
            flush(&mut ring, &mut batch, batch_time, &mut samples)?;
            batch_key = key;
            batch_time = if opts.has_time {
                tab.cell(id, TIME_COL).and_then(|c| c.parse().ok())
            } else {
                None
            };
        }

        if let Some(row) = tab.row_owned(id) {
            let keep: Vec<_> = row
                .into_iter()
                .filter(|(name, _)| batch.has_column(name))
                .collect();
            batch.add_row_cells(keep);
        }
    }
    flush(&mut ring, &mut batch, batch_time, &mut samples)?;

    ring.close()?;
    Ok(samples)
}

/// Imports a text file into a ring.
pub fn import_file(
    path: impl AsRef<std::path::Path>,
    ring_name: &str,
    infile: impl AsRef<std::path::Path>,
    opts: &ImportOptions,
    config: StoreConfig,
) -> Result<usize, RingError> {
    let text = std::fs::read_to_string(infile).map_err(diskstore::StoreError::from)?;
    import_text(path, ring_name, &text, opts, config)
}
