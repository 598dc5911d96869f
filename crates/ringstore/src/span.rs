//! Span Index: runs of consecutive sequences sharing one schema header.
//!
//! Each ring keeps a single auxiliary record keyed `__span_<ring>` whose
//! value is a table body of rows
//! `(from_seq, to_seq, from_time, to_time, header)`. Every sample in
//! `[from_seq, to_seq]` shares the `header` string. Spans never overlap;
//! when the ring evicts sequences the spans below the new oldest are
//! dropped and a straddling span has its `from` edge advanced.

use crate::error::RingError;
use crate::ring::{Seconds, TimeRing};
use diskstore::Store;
use tabular::{ScanOptions, Table};

/// Reserved key prefix of span records.
pub const SPAN_PREFIX: &str = "__span_";

const FROM_COL: &str = "from_seq";
const TO_COL: &str = "to_seq";
const FROM_TIME_COL: &str = "from_time";
const TO_TIME_COL: &str = "to_time";
const HEADER_COL: &str = "header";

/// One span: a sequence range, its time bounds and the shared header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub from: u64,
    pub to: u64,
    pub from_time: Seconds,
    pub to_time: Seconds,
    pub header: String,
}

/// How [`SpanTable::by_time`] behaves when no span contains the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hunt {
    /// Only a containing span matches.
    Exact,
    /// Fall back to the nearest earlier span.
    Prev,
    /// Fall back to the nearest later span.
    Next,
}

/// A ring's spans, held as a table while being queried or edited.
#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    tab: Table,
}

fn span_key(ring: &str) -> String {
    format!("{SPAN_PREFIX}{ring}")
}

fn parse_u64(cell: Option<&str>, what: &str) -> Result<u64, RingError> {
    cell.and_then(|c| c.parse().ok())
        .ok_or_else(|| RingError::Corrupt(format!("span {what} cell")))
}

impl SpanTable {
    /// An empty span table with the block schema in place.
    pub fn new() -> Self {
        Self {
            tab: Table::with_columns([FROM_COL, TO_COL, FROM_TIME_COL, TO_TIME_COL, HEADER_COL]),
        }
    }

    /// Reads the span record of `ring`, or `None` when the ring has no
    /// spans yet.
    pub fn read(ring: &mut TimeRing) -> Result<Option<Self>, RingError> {
        let name = ring.name().to_string();
        Self::read_from(ring.store_mut(), &name)
    }

    /// As [`read`](Self::read), addressed by store and ring name.
    pub fn read_from(store: &mut Store, ring: &str) -> Result<Option<Self>, RingError> {
        let Some(raw) = store.get(&span_key(ring))? else {
            return Ok(None);
        };
        let text = String::from_utf8(raw)
            .map_err(|_| RingError::Corrupt("span record is not text".to_string()))?;
        let mut spans = Self::new();
        spans.tab.scan(&text, &ScanOptions::new("\t"))?;
        Ok(Some(spans))
    }

    /// Writes this table back as the ring's span record.
    pub fn write(&self, ring: &mut TimeRing) -> Result<(), RingError> {
        let name = ring.name().to_string();
        self.write_to(ring.store_mut(), &name)
    }

    /// As [`write`](Self::write), addressed by store and ring name.
    pub fn write_to(&self, store: &mut Store, ring: &str) -> Result<(), RingError> {
        let body = self.tab.out_body('\t');
        store.put(&span_key(ring), body.as_bytes())?;
        Ok(())
    }

    /// Number of spans recorded.
    pub fn len(&self) -> usize {
        self.tab.nrows()
    }

    /// True when no spans are recorded.
    pub fn is_empty(&self) -> bool {
        self.tab.is_empty()
    }

    /// Records a new span covering `[from, to]`. Rejected when it would
    /// overlap an existing span.
    pub fn add(
        &mut self,
        from: u64,
        to: u64,
        from_time: Seconds,
        to_time: Seconds,
        header: &str,
    ) -> Result<(), RingError> {
        if self.overlaps(from, to) {
            return Err(RingError::SpanOverlap { from, to });
        }
        self.tab.add_row_cells(vec![
            (FROM_COL.to_string(), Some(from.to_string())),
            (TO_COL.to_string(), Some(to.to_string())),
            (FROM_TIME_COL.to_string(), Some(from_time.to_string())),
            (TO_TIME_COL.to_string(), Some(to_time.to_string())),
            (HEADER_COL.to_string(), Some(header.to_string())),
        ]);
        Ok(())
    }

    /// Stretches the span recorded as `[from, to]` out to `new_to`.
    pub fn extend(
        &mut self,
        from: u64,
        to: u64,
        new_to: u64,
        new_to_time: Seconds,
    ) -> Result<(), RingError> {
        for id in self.tab.row_ids() {
            let row_from = parse_u64(self.tab.cell(id, FROM_COL), FROM_COL)?;
            let row_to = parse_u64(self.tab.cell(id, TO_COL), TO_COL)?;
            if row_from == from && row_to == to {
                self.tab.replace_cell(id, TO_COL, Some(new_to.to_string()))?;
                self.tab
                    .replace_cell(id, TO_TIME_COL, Some(new_to_time.to_string()))?;
                return Ok(());
            }
        }
        Err(RingError::SpanNotFound { from, to })
    }

    /// True when `[from, to]` intersects any recorded span.
    pub fn overlaps(&self, from: u64, to: u64) -> bool {
        self.iter().any(|span| {
            (from >= span.from && from <= span.to)
                || (to >= span.from && to <= span.to)
                || (span.from >= from && span.to <= to)
        })
    }

    /// The span with the highest `to_seq`.
    pub fn latest(&self) -> Option<Span> {
        self.iter().max_by_key(|s| s.to)
    }

    /// The span with the lowest `to_seq`.
    pub fn oldest(&self) -> Option<Span> {
        self.iter().min_by_key(|s| s.to)
    }

    /// The span containing `seq`.
    pub fn by_seq(&self, seq: u64) -> Option<Span> {
        self.iter().find(|s| seq >= s.from && seq <= s.to)
    }

    /// The span containing time `t`, with the hunt policy deciding what
    /// an inexact match returns.
    pub fn by_time(&self, t: Seconds, hunt: Hunt) -> Option<Span> {
        if let Some(exact) = self
            .iter()
            .find(|s| t >= s.from_time && t <= s.to_time)
        {
            return Some(exact);
        }
        match hunt {
            Hunt::Exact => None,
            Hunt::Prev => self
                .iter()
                .filter(|s| s.to_time < t)
                .max_by_key(|s| s.from_time),
            Hunt::Next => self
                .iter()
                .filter(|s| s.from_time > t)
                .min_by_key(|s| s.from_time),
        }
    }

    /// The first span whose header equals `header`.
    pub fn search(&self, header: &str) -> Option<Span> {
        self.iter().find(|s| s.header == header)
    }

    /// Drops spans wholly below `oldest_seq` and advances the `from`
    /// edge of a straddling span. Returns the number of spans touched.
    pub fn purge(&mut self, oldest_seq: u64, oldest_time: Seconds) -> Result<usize, RingError> {
        let mut touched = 0;
        self.tab.first();
        while !self.tab.beyond_end() {
            let id = match self.tab.current_row_id() {
                Some(id) => id,
                None => break,
            };
            let to = parse_u64(self.tab.cell(id, TO_COL), TO_COL)?;
            let from = parse_u64(self.tab.cell(id, FROM_COL), FROM_COL)?;
            if to < oldest_seq {
                // the span is wholly below the ring now
                self.tab.remove_current_row()?;
                touched += 1;
                continue; // removal advanced the cursor
            }
            if from < oldest_seq {
                self.tab
                    .replace_current_cell(FROM_COL, Some(oldest_seq.to_string()))?;
                self.tab
                    .replace_current_cell(FROM_TIME_COL, Some(oldest_time.to_string()))?;
                touched += 1;
            }
            self.tab.next();
        }
        Ok(touched)
    }

    /// All spans in row order.
    pub fn iter(&self) -> impl Iterator<Item = Span> + '_ {
        self.tab.row_ids().into_iter().filter_map(move |id| {
            Some(Span {
                from: self.tab.cell(id, FROM_COL)?.parse().ok()?,
                to: self.tab.cell(id, TO_COL)?.parse().ok()?,
                from_time: self.tab.cell(id, FROM_TIME_COL)?.parse().ok()?,
                to_time: self.tab.cell(id, TO_TIME_COL)?.parse().ok()?,
                header: self.tab.cell(id, HEADER_COL)?.to_string(),
            })
        })
    }

    /// The underlying table, for rendering.
    pub fn as_table(&self) -> &Table {
        &self.tab
    }
}

// ---------------------------------------------------------------------
// STORE-WIDE QUERIES
// ---------------------------------------------------------------------

/// Reads every span record in the store into one table with columns
/// `ring, from, time start, to, time end, header`.
pub fn read_ring_blocks(store: &mut Store) -> Result<Table, RingError> {
    let hits = store.search(Some(&format!("^{SPAN_PREFIX}")), None)?;
    let mut tab = Table::with_columns(["ring", "from", "time start", "to", "time end", "header"]);
    for (key, value) in hits {
        let ring = key[SPAN_PREFIX.len()..].to_string();
        let text = String::from_utf8(value)
            .map_err(|_| RingError::Corrupt("span record is not text".to_string()))?;
        let fields = tabular::scan_fields(&text, "\t", false)
            .map_err(tabular::TableError::from)?;
        for row in fields {
            if row.len() < 5 {
                continue;
            }
            tab.add_row([
                ("ring", ring.as_str()),
                ("from", row[0].as_str()),
                ("to", row[1].as_str()),
                ("time start", row[2].as_str()),
                ("time end", row[3].as_str()),
                ("header", row[4].as_str()),
            ]);
        }
    }
    Ok(tab)
}

/// Lists the rings that have a span record, names stripped of the
/// reserved prefix.
pub fn ls_rings(store: &mut Store) -> Result<Vec<String>, RingError> {
    let hits = store.search(Some(&format!("^{SPAN_PREFIX}")), None)?;
    Ok(hits
        .into_iter()
        .map(|(k, _)| k[SPAN_PREFIX.len()..].to_string())
        .collect())
}

/// Splits a conventional ring name `r.<root><digits>` into its root and
/// duration. Returns `None` for names outside the convention.
pub fn name_root(ring: &str) -> Option<(&str, u32)> {
    let rest = ring.strip_prefix("r.")?;
    let digits_at = rest.find(|c: char| c.is_ascii_digit())?;
    let (root, digits) = rest.split_at(digits_at);
    if root.is_empty() {
        return None;
    }
    let duration: u32 = digits.parse().ok()?;
    Some((root, duration))
}

/// The set of name roots present in a ring-blocks table, in first-seen
/// order.
pub fn name_roots(blocks: &Table) -> Vec<String> {
    let mut roots: Vec<String> = Vec::new();
    for id in blocks.row_ids() {
        let Some(ring) = blocks.cell(id, "ring") else {
            continue;
        };
        if let Some((root, _)) = name_root(ring) {
            if !roots.iter().any(|r| r == root) {
                roots.push(root.to_string());
            }
        }
    }
    roots
}

/// Rings sharing `root` whose span time ranges intersect
/// `[from_time, to_time]`, plus the overall coverage of the root.
pub fn rings_by_root_and_time(
    blocks: &Table,
    root: &str,
    from_time: Seconds,
    to_time: Seconds,
) -> (Vec<String>, Option<(Seconds, Seconds)>) {
    let mut rings: Vec<String> = Vec::new();
    let mut begin: Option<Seconds> = None;
    let mut end: Option<Seconds> = None;

    for id in blocks.row_ids() {
        let Some(ring) = blocks.cell(id, "ring") else {
            continue;
        };
        match name_root(ring) {
            Some((r, _)) if r == root => {}
            _ => continue,
        }
        let Some(oldest) = blocks.cell(id, "time start").and_then(|c| c.parse().ok()) else {
            continue;
        };
        let Some(newest) = blocks.cell(id, "time end").and_then(|c| c.parse().ok()) else {
            continue;
        };
        let oldest: Seconds = oldest;
        let newest: Seconds = newest;

        let intersects = (to_time >= oldest && to_time <= newest)
            || (from_time >= oldest && from_time <= newest)
            || (from_time <= oldest && to_time >= newest);
        if intersects && !rings.iter().any(|r| r == ring) {
            rings.push(ring.to_string());
        }

        begin = Some(begin.map_or(oldest, |b| b.min(oldest)));
        end = Some(end.map_or(newest, |e| e.max(newest)));
    }

    (rings, begin.zip(end))
}

/// Distinct headers covering any sequence in `[from_seq, to_seq]`.
pub fn headers_by_seq_range(spans: &SpanTable, from_seq: u64, to_seq: u64) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for span in spans.iter() {
        let intersects = (to_seq >= span.from && to_seq <= span.to)
            || (from_seq >= span.from && from_seq <= span.to)
            || (from_seq <= span.from && to_seq >= span.to);
        if intersects && !headers.iter().any(|h| h == &span.header) {
            headers.push(span.header);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskstore::StoreConfig;

    fn ring_with_store() -> (tempfile::TempDir, TimeRing) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.span.dat");
        let ring = TimeRing::create(&path, "sptest", "span test", 100, 0,
                                    StoreConfig::default()).unwrap();
        (dir, ring)
    }

    #[test]
    fn test_read_absent_block() {
        let (_dir, mut ring) = ring_with_store();
        assert!(SpanTable::read(&mut ring).unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_back() {
        let (_dir, mut ring) = ring_with_store();
        let mut spans = SpanTable::new();
        spans.add(1, 1, 100, 100, "skiing").unwrap();
        spans.write(&mut ring).unwrap();

        let back = SpanTable::read(&mut ring).unwrap().unwrap();
        let span = back.latest().unwrap();
        assert_eq!(span.from, 1);
        assert_eq!(span.to, 1);
        assert_eq!(span.header, "skiing");
    }

    #[test]
    fn test_multiline_header_survives_block() {
        let (_dir, mut ring) = ring_with_store();
        let header = "a\tb\nstr\ti32\ttype\n--\n";
        let mut spans = SpanTable::new();
        spans.add(1, 4, 10, 40, header).unwrap();
        spans.write(&mut ring).unwrap();

        let back = SpanTable::read(&mut ring).unwrap().unwrap();
        assert_eq!(back.by_seq(2).unwrap().header, header);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut spans = SpanTable::new();
        spans.add(0, 13, 1, 2, "skiing").unwrap();
        assert!(matches!(
            spans.add(13, 20, 3, 4, "downhill"),
            Err(RingError::SpanOverlap { .. })
        ));
        assert!(matches!(
            spans.add(0, 0, 3, 4, "downhill"),
            Err(RingError::SpanOverlap { .. })
        ));
        // a span containing the whole range also collides
        assert!(spans.overlaps(0, 100));
        spans.add(14, 62, 3, 4, "downhill").unwrap();
    }

    #[test]
    fn test_latest_and_oldest() {
        let mut spans = SpanTable::new();
        spans.add(0, 13, 1, 2, "skiing").unwrap();
        spans.add(14, 62, 3, 4, "downhill").unwrap();
        spans.add(63, 1210, 5, 6, "only").unwrap();

        assert_eq!(spans.latest().unwrap().header, "only");
        assert_eq!(spans.oldest().unwrap().header, "skiing");
    }

    #[test]
    fn test_by_seq() {
        let mut spans = SpanTable::new();
        spans.add(0, 13, 1, 2, "skiing").unwrap();
        spans.add(14, 62, 3, 4, "downhill").unwrap();

        assert_eq!(spans.by_seq(14).unwrap().header, "downhill");
        assert_eq!(spans.by_seq(13).unwrap().header, "skiing");
        assert!(spans.by_seq(63).is_none());
    }

    #[test]
    fn test_by_time_hunting() {
        let mut spans = SpanTable::new();
        spans.add(0, 10, 100, 200, "early").unwrap();
        spans.add(11, 20, 300, 400, "late").unwrap();

        assert_eq!(spans.by_time(150, Hunt::Exact).unwrap().header, "early");
        assert!(spans.by_time(250, Hunt::Exact).is_none());
        assert_eq!(spans.by_time(250, Hunt::Prev).unwrap().header, "early");
        assert_eq!(spans.by_time(250, Hunt::Next).unwrap().header, "late");
        assert!(spans.by_time(50, Hunt::Prev).is_none());
        assert!(spans.by_time(450, Hunt::Next).is_none());
    }

    #[test]
    fn test_extend() {
        let mut spans = SpanTable::new();
        spans.add(0, 0, 100, 100, "downhill").unwrap();
        spans.extend(0, 0, 57, 500).unwrap();

        let span = spans.latest().unwrap();
        assert_eq!(span.to, 57);
        assert_eq!(span.to_time, 500);

        assert!(matches!(
            spans.extend(9, 9, 10, 10),
            Err(RingError::SpanNotFound { .. })
        ));
    }

    #[test]
    fn test_purge_drops_and_straddles() {
        let mut spans = SpanTable::new();
        spans.add(0, 13, 1, 2, "skiing").unwrap();
        spans.add(14, 62, 3, 4, "downhill").unwrap();

        // drop the first span entirely, trim the second
        let touched = spans.purge(20, 99).unwrap();
        assert_eq!(touched, 2);
        assert_eq!(spans.len(), 1);
        let span = spans.latest().unwrap();
        assert_eq!(span.from, 20);
        assert_eq!(span.from_time, 99);
        assert_eq!(span.to, 62);
    }

    #[test]
    fn test_purge_whole_table() {
        let mut spans = SpanTable::new();
        spans.add(0, 0, 1, 1, "solo").unwrap();
        assert_eq!(spans.purge(0, 1).unwrap(), 0); // nothing below 0
        assert_eq!(spans.purge(1, 1).unwrap(), 1);
        assert!(spans.latest().is_none());
    }

    #[test]
    fn test_search_by_header() {
        let mut spans = SpanTable::new();
        spans.add(1213, 2001, 9, 9, "moon").unwrap();
        let span = spans.search("moon").unwrap();
        assert_eq!(span.from, 1213);
        assert!(spans.search("frog").is_none());
    }

    #[test]
    fn test_name_root_convention() {
        assert_eq!(name_root("r.cpu60"), Some(("cpu", 60)));
        assert_eq!(name_root("r.aaa1"), Some(("aaa", 1)));
        assert_eq!(name_root("e.cpu60"), None);
        assert_eq!(name_root("r.noperiod"), None);
        assert_eq!(name_root("r.60"), None);
    }

    #[test]
    fn test_ring_blocks_and_roots() {
        let (_dir, ring) = ring_with_store();
        let mut store = ring.into_store();

        for (name, from, to, t0, t1, hdr) in [
            ("r.aaa1", 0u64, 1u64, 100u32, 200u32, "aaa"),
            ("r.aaa60", 2, 3, 300, 400, "bbb"),
            ("r.bbb60", 4, 5, 500, 600, "ccc"),
            ("e.ccc7", 6, 7, 700, 800, "ddd"),
        ] {
            let mut ring = TimeRing::create_in(store, name, "", 10, 0).unwrap();
            let mut spans = SpanTable::new();
            spans.add(from, to, t0, t1, hdr).unwrap();
            spans.write(&mut ring).unwrap();
            store = ring.into_store();
        }

        let blocks = read_ring_blocks(&mut store).unwrap();
        assert_eq!(blocks.nrows(), 4);

        let roots = name_roots(&blocks);
        assert_eq!(roots, ["aaa", "bbb"]);

        let (rings, coverage) = rings_by_root_and_time(&blocks, "aaa", 150, 350);
        assert_eq!(rings, ["r.aaa1", "r.aaa60"]);
        assert_eq!(coverage, Some((100, 400)));

        let (rings, _) = rings_by_root_and_time(&blocks, "aaa", 1000, 2000);
        assert!(rings.is_empty());
    }

    #[test]
    fn test_headers_by_seq_range() {
        let mut spans = SpanTable::new();
        spans.add(0, 10, 1, 2, "one").unwrap();
        spans.add(11, 20, 3, 4, "two").unwrap();
        spans.add(21, 30, 5, 6, "one").unwrap();

        let headers = headers_by_seq_range(&spans, 5, 15);
        assert_eq!(headers, ["one", "two"]);
        let headers = headers_by_seq_range(&spans, 0, 30);
        assert_eq!(headers, ["one", "two"]);
        assert!(headers_by_seq_range(&spans, 31, 40).is_empty());
    }
}
