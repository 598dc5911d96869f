//! Table-Ring: a ring whose samples are tables.
//!
//! Each put renders the table body as the sample blob and records the
//! table's canonical header text in the span index; consecutive samples
//! sharing a header share one span, so the schema costs one record per
//! run instead of one per sample. Reads look the header up by sequence,
//! reconstitute the table and add `_seq` and `_time` columns from the
//! underlying ring.

use crate::error::RingError;
use crate::ring::{now, Sample, RingStat, Seconds, TimeRing};
use crate::span::SpanTable;
use diskstore::{Store, StoreConfig, TxnMode};
use tabular::{ScanOptions, Table};

/// The canonical header text of a table: tab-joined column names, each
/// info row with its trailing label, then the `--` ruler line.
pub fn header_text(tab: &Table) -> String {
    Table::from_schema(tab).out_table('\t', true, true)
}

/// A ring of tables over a [`TimeRing`].
pub struct TableRing {
    ring: TimeRing,
}

impl TableRing {
    /// Creates a table ring, creating the store file if absent.
    pub fn create(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        description: &str,
        slots: u32,
        duration: u32,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        Ok(Self {
            ring: TimeRing::create(path, ring, description, slots, duration, config)?,
        })
    }

    /// Creates a table ring in an already-open store.
    pub fn create_in(
        store: Store,
        ring: &str,
        description: &str,
        slots: u32,
        duration: u32,
    ) -> Result<Self, RingError> {
        Ok(Self {
            ring: TimeRing::create_in(store, ring, description, slots, duration)?,
        })
    }

    /// Opens an existing table ring.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        Ok(Self {
            ring: TimeRing::open(path, ring, config)?,
        })
    }

    /// Opens an existing table ring in an already-open store.
    pub fn open_in(store: Store, ring: &str) -> Result<Self, RingError> {
        Ok(Self {
            ring: TimeRing::open_in(store, ring)?,
        })
    }

    /// Wraps an already-open time ring.
    pub fn from_ring(ring: TimeRing) -> Self {
        Self { ring }
    }

    /// The ring's name.
    pub fn name(&self) -> &str {
        self.ring.name()
    }

    /// The underlying time ring.
    pub fn ring_mut(&mut self) -> &mut TimeRing {
        &mut self.ring
    }

    /// Gives the underlying store back.
    pub fn into_store(self) -> Store {
        self.ring.into_store()
    }

    /// Closes the ring and its store.
    pub fn close(self) -> Result<(), RingError> {
        self.ring.close()
    }

    /// Removes the ring, its spans and samples.
    pub fn destroy(self) -> Result<Store, RingError> {
        self.ring.destroy()
    }

    // ---------------------------------------------------------------------
    // WRITE PATH
    // ---------------------------------------------------------------------

    /// Appends a table stamped with the current time.
    pub fn put(&mut self, tab: &Table) -> Result<u64, RingError> {
        self.put_with_time(tab, now())
    }

    /// Appends a table with a caller-supplied time.
    ///
    /// The sample write, any eviction, the span purge that follows it
    /// and the span extension or creation all commit in one write
    /// transaction.
    pub fn put_with_time(&mut self, tab: &Table, time: Seconds) -> Result<u64, RingError> {
        let header = header_text(tab);
        let body = tab.out_body('\t');

        self.ring.with_txn(TxnMode::Write, |ring| {
            let seq = ring.put_with_time(body.as_bytes(), time)?;

            let mut spans = SpanTable::read(ring)?.unwrap_or_default();

            // eviction may have advanced the oldest edge; spans follow
            let meta = ring.read_meta()?;
            if meta.count() > 0 {
                let oldest_time = ring.get_time_of(meta.oldest)?;
                spans.purge(meta.oldest, oldest_time)?;
            }

            match spans.latest() {
                Some(last) if last.header == header && last.to + 1 == seq => {
                    spans.extend(last.from, last.to, seq, time)?;
                }
                _ => {
                    spans.add(seq, seq, time, time, &header)?;
                }
            }
            spans.write(ring)?;
            Ok(seq)
        })
    }

    // ---------------------------------------------------------------------
    // READ PATH
    // ---------------------------------------------------------------------

    /// Returns the table at the cursor, advancing it when asked. The
    /// returned table carries `_seq` and `_time` columns.
    pub fn get(&mut self, advance: bool) -> Result<Option<Table>, RingError> {
        self.ring.with_txn(TxnMode::Read, |ring| {
            let Some(sample) = ring.get(advance)? else {
                return Ok(None);
            };
            let spans = SpanTable::read(ring)?.unwrap_or_default();
            Ok(Some(rebuild(&sample, &spans)?))
        })
    }

    /// Reads up to `n` consecutive samples from the cursor into one
    /// merged table; samples with differing schemas union their columns.
    /// Returns `None` when the cursor is already past the youngest.
    pub fn mget(&mut self, n: usize) -> Result<Option<Table>, RingError> {
        self.ring.with_txn(TxnMode::Read, |ring| {
            let samples = ring.mget_n(n)?;
            if samples.is_empty() {
                return Ok(None);
            }
            let spans = SpanTable::read(ring)?.unwrap_or_default();

            let mut merged: Option<Table> = None;
            for sample in &samples {
                let one = rebuild(sample, &spans)?;
                match merged.as_mut() {
                    None => merged = Some(one),
                    Some(out) => {
                        for name in one.column_names() {
                            if !out.has_column(name) {
                                out.add_column(name, None)?;
                            }
                        }
                        for id in one.row_ids() {
                            if let Some(row) = one.row_owned(id) {
                                out.add_row_cells(row);
                            }
                        }
                    }
                }
            }
            Ok(merged)
        })
    }

    /// Every live sample, from the oldest, as one merged table.
    pub fn get_all(&mut self) -> Result<Option<Table>, RingError> {
        self.ring.goto_oldest()?;
        self.mget(usize::MAX)
    }

    // ---------------------------------------------------------------------
    // CURSOR & COUNTERS (delegated)
    // ---------------------------------------------------------------------

    /// See [`TimeRing::goto`].
    pub fn goto(&mut self, seq: u64) -> Result<(), RingError> {
        self.ring.goto(seq)
    }

    /// See [`TimeRing::rewind`].
    pub fn rewind(&mut self, k: u64) -> Result<(), RingError> {
        self.ring.rewind(k)
    }

    /// See [`TimeRing::forward`].
    pub fn forward(&mut self, k: u64) -> Result<(), RingError> {
        self.ring.forward(k)
    }

    /// See [`TimeRing::goto_oldest`].
    pub fn goto_oldest(&mut self) -> Result<(), RingError> {
        self.ring.goto_oldest()
    }

    /// See [`TimeRing::goto_youngest`].
    pub fn goto_youngest(&mut self) -> Result<(), RingError> {
        self.ring.goto_youngest()
    }

    /// See [`TimeRing::stat`].
    pub fn stat(&mut self) -> Result<RingStat, RingError> {
        self.ring.stat()
    }

    /// See [`TimeRing::resize`]. Spans follow the eviction.
    pub fn resize(&mut self, new_slots: u32) -> Result<(), RingError> {
        self.ring.with_txn(TxnMode::Write, |ring| {
            ring.resize(new_slots)?;
            sync_spans_to_oldest(ring)
        })
    }

    /// See [`TimeRing::purge`]. Spans follow the purge.
    pub fn purge(&mut self, before_seq: u64) -> Result<u64, RingError> {
        self.ring.with_txn(TxnMode::Write, |ring| {
            let dropped = ring.purge(before_seq)?;
            sync_spans_to_oldest(ring)?;
            Ok(dropped)
        })
    }
}

/// Purges the span record down to the ring's current oldest edge.
fn sync_spans_to_oldest(ring: &mut TimeRing) -> Result<(), RingError> {
    let meta = ring.read_meta()?;
    let Some(mut spans) = SpanTable::read(ring)? else {
        return Ok(());
    };
    let oldest_time = if meta.count() > 0 {
        ring.get_time_of(meta.oldest)?
    } else {
        0
    };
    spans.purge(meta.oldest, oldest_time)?;
    spans.write(ring)?;
    Ok(())
}

/// Reconstitutes one sample against its span header.
fn rebuild(sample: &Sample, spans: &SpanTable) -> Result<Table, RingError> {
    let span = spans
        .by_seq(sample.seq)
        .ok_or_else(|| RingError::Corrupt(format!("no span covers sequence {}", sample.seq)))?;

    let mut tab = Table::new();
    let header_opts = ScanOptions {
        seps: "\t".to_string(),
        multisep: false,
        has_names: true,
        has_info: true,
    };
    tab.scan(&span.header, &header_opts)?;

    let body = std::str::from_utf8(&sample.data)
        .map_err(|_| RingError::Corrupt(format!("sample {} body is not text", sample.seq)))?;
    tab.scan(body, &ScanOptions::new("\t"))?;

    tab.add_column("_seq", None)?;
    tab.add_column("_time", None)?;
    for id in tab.row_ids() {
        tab.replace_cell(id, "_seq", Some(sample.seq.to_string()))?;
        tab.replace_cell(id, "_time", Some(sample.time.to_string()))?;
    }
    Ok(tab)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tab.dat");
        (dir, path)
    }

    fn ab_table(rows: &[(&str, &str)]) -> Table {
        let mut t = Table::with_columns(["A", "B"]);
        for (a, b) in rows {
            t.add_row([("A", *a), ("B", *b)]);
        }
        t
    }

    #[test]
    fn test_header_text_shape() {
        let mut t = ab_table(&[("1", "2")]);
        t.add_info("type", [("A", "i32"), ("B", "i32")]);
        let text = header_text(&t);
        assert_eq!(text, "A\tB\ni32\ti32\ttype\n--\n");
    }

    #[test]
    fn test_shared_header_extends_span() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 0, 0,
                                         StoreConfig::default()).unwrap();
        ring.put_with_time(&ab_table(&[("1", "2"), ("3", "4")]), 10).unwrap();
        ring.put_with_time(&ab_table(&[("5", "6")]), 20).unwrap();

        let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
        assert_eq!(spans.len(), 1);
        let span = spans.latest().unwrap();
        assert_eq!((span.from, span.to), (1, 2));
        assert_eq!((span.from_time, span.to_time), (10, 20));
    }

    #[test]
    fn test_schema_change_opens_new_span() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 0, 0,
                                         StoreConfig::default()).unwrap();
        ring.put_with_time(&ab_table(&[("1", "2"), ("3", "4")]), 10).unwrap();
        ring.put_with_time(&ab_table(&[("5", "6")]), 20).unwrap();

        let mut cd = Table::with_columns(["C", "D"]);
        cd.add_row([("C", "7"), ("D", "8")]);
        ring.put_with_time(&cd, 30).unwrap();

        let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
        assert_eq!(spans.len(), 2);
        let first = spans.oldest().unwrap();
        let second = spans.latest().unwrap();
        assert_eq!((first.from, first.to), (1, 2));
        assert_eq!((second.from, second.to), (3, 3));
        assert!(!spans.overlaps(4, 4));
    }

    #[test]
    fn test_get_reconstitutes_with_seq_and_time() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 0, 0,
                                         StoreConfig::default()).unwrap();
        let mut t = ab_table(&[("1", "2")]);
        t.add_info("type", [("A", "i32"), ("B", "i32")]);
        ring.put_with_time(&t, 99).unwrap();

        ring.goto_oldest().unwrap();
        let got = ring.get(true).unwrap().unwrap();
        assert_eq!(got.column_names(), ["A", "B", "_seq", "_time"]);
        assert_eq!(got.cell(0, "A"), Some("1"));
        assert_eq!(got.cell(0, "_seq"), Some("1"));
        assert_eq!(got.cell(0, "_time"), Some("99"));
        assert_eq!(got.info_cell("type", "B"), Some("i32"));
    }

    #[test]
    fn test_mget_merges_mixed_schemas() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 0, 0,
                                         StoreConfig::default()).unwrap();
        ring.put_with_time(&ab_table(&[("1", "2")]), 10).unwrap();
        let mut cd = Table::with_columns(["C", "D"]);
        cd.add_row([("C", "7"), ("D", "8")]);
        ring.put_with_time(&cd, 20).unwrap();

        ring.goto_oldest().unwrap();
        let merged = ring.mget(10).unwrap().unwrap();
        assert_eq!(merged.nrows(), 2);
        assert!(merged.has_column("A") && merged.has_column("C"));
        assert_eq!(merged.cell(0, "A"), Some("1"));
        assert_eq!(merged.cell(0, "C"), None);
        assert_eq!(merged.cell(1, "C"), Some("7"));
    }

    #[test]
    fn test_eviction_purges_spans() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 2, 0,
                                         StoreConfig::default()).unwrap();
        for i in 0..5u32 {
            let mut t = Table::with_columns(["v"]);
            t.add_row([("v", i.to_string().as_str())]);
            ring.put_with_time(&t, 100 + i).unwrap();
        }
        let stat = ring.stat().unwrap();
        assert_eq!((stat.oldest, stat.youngest), (4, 5));

        let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
        assert_eq!(spans.len(), 1);
        let span = spans.latest().unwrap();
        assert_eq!(span.from, 4);
        assert_eq!(span.to, 5);
    }

    #[test]
    fn test_purge_trims_spans() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 2, 0,
                                         StoreConfig::default()).unwrap();
        for i in 0..5u32 {
            let mut t = Table::with_columns(["v"]);
            t.add_row([("v", i.to_string().as_str())]);
            ring.put_with_time(&t, 100 + i).unwrap();
        }
        ring.purge(4).unwrap();
        let stat = ring.stat().unwrap();
        assert_eq!((stat.oldest, stat.youngest), (4, 5));

        let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans.latest().unwrap().from, 4);
    }

    #[test]
    fn test_every_live_sample_has_exactly_one_span() {
        let (_dir, path) = scratch();
        let mut ring = TableRing::create(&path, "t", "", 3, 0,
                                         StoreConfig::default()).unwrap();
        for i in 0..7u32 {
            let cols = if i % 3 == 0 { ["A", "B"] } else { ["C", "D"] };
            let mut t = Table::with_columns(cols);
            t.add_row([(cols[0], "1"), (cols[1], "2")]);
            ring.put_with_time(&t, 100 + i).unwrap();
        }
        let stat = ring.stat().unwrap();
        let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
        for seq in stat.oldest..=stat.youngest {
            let covering: Vec<_> = spans
                .iter()
                .filter(|s| seq >= s.from && seq <= s.to)
                .collect();
            assert_eq!(covering.len(), 1, "sequence {seq}");
        }
    }
}
