//! End-to-end scenarios across the ring layers: capacity and eviction,
//! span bookkeeping, export/import round trips and purge behaviour.

use diskstore::StoreConfig;
use ringstore::{
    export_ring, import_text, ExportOptions, ImportOptions, SpanTable, TableRing, TimeRing,
};
use tabular::Table;

fn scratch(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

/// E1: a three-slot ring keeps the three youngest of four puts.
#[test]
fn bounded_ring_keeps_youngest() {
    let (_dir, path) = scratch("s1.dat");
    let mut ring = TimeRing::create(&path, "r1", "", 3, 0, StoreConfig::default()).unwrap();
    for (i, blob) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
        ring.put_with_time(*blob, i as u32 + 1).unwrap();
    }

    let stat = ring.stat().unwrap();
    assert_eq!(stat.oldest, 2);
    assert_eq!(stat.youngest, 4);

    ring.goto_oldest().unwrap();
    let all: Vec<Vec<u8>> = ring
        .mget_n(100)
        .unwrap()
        .into_iter()
        .map(|s| s.data)
        .collect();
    assert_eq!(all, [b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
}

/// E2: an unbounded ring keeps all hundred samples in time order.
#[test]
fn unbounded_ring_keeps_all() {
    let (_dir, path) = scratch("s2.dat");
    let mut ring = TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
    for t in 1..=100u32 {
        ring.put_with_time(format!("{t}").as_bytes(), t).unwrap();
    }
    let stat = ring.stat().unwrap();
    assert_eq!(stat.oldest, 1);
    assert_eq!(stat.youngest, 100);

    ring.goto_oldest().unwrap();
    let samples = ring.mget_n(1000).unwrap();
    assert_eq!(samples.len(), 100);
    // monotonic sequences, non-decreasing times
    for pair in samples.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
        assert!(pair[0].time <= pair[1].time);
    }
}

fn ab(rows: &[(&str, &str)]) -> Table {
    let mut t = Table::with_columns(["A", "B"]);
    for (a, b) in rows {
        t.add_row([("A", *a), ("B", *b)]);
    }
    t
}

/// E3: consecutive same-schema samples share one span.
#[test]
fn same_schema_shares_one_span() {
    let (_dir, path) = scratch("s3.dat");
    let mut ring = TableRing::create(&path, "t", "", 0, 0, StoreConfig::default()).unwrap();
    ring.put_with_time(&ab(&[("1", "2"), ("3", "4")]), 10).unwrap();
    ring.put_with_time(&ab(&[("5", "6")]), 20).unwrap();

    let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
    assert_eq!(spans.len(), 1);
    let span = spans.latest().unwrap();
    assert_eq!((span.from, span.to), (1, 2));
    assert_eq!((span.from_time, span.to_time), (10, 20));
    assert!(span.header.starts_with("A\tB\n"));
}

/// E4: a schema change opens a second, non-overlapping span.
#[test]
fn schema_change_grows_second_span() {
    let (_dir, path) = scratch("s4.dat");
    let mut ring = TableRing::create(&path, "t", "", 0, 0, StoreConfig::default()).unwrap();
    ring.put_with_time(&ab(&[("1", "2"), ("3", "4")]), 10).unwrap();
    ring.put_with_time(&ab(&[("5", "6")]), 20).unwrap();

    let mut cd = Table::with_columns(["C", "D"]);
    cd.add_row([("C", "7"), ("D", "8")]);
    ring.put_with_time(&cd, 30).unwrap();

    let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
    assert_eq!(spans.len(), 2);
    let spans_vec: Vec<_> = spans.iter().collect();
    assert_eq!((spans_vec[0].from, spans_vec[0].to), (1, 2));
    assert_eq!((spans_vec[1].from, spans_vec[1].to), (3, 3));
    // non-overlap: each live sequence is covered exactly once
    for seq in 1..=3u64 {
        assert_eq!(
            spans.iter().filter(|s| seq >= s.from && seq <= s.to).count(),
            1
        );
    }
}

/// E5: export and re-import reproduce both the samples and the span
/// structure.
#[test]
fn export_import_reproduces_ring() {
    let (_dir, path) = scratch("s5a.dat");
    let mut ring = TableRing::create(&path, "t", "", 0, 0, StoreConfig::default()).unwrap();
    ring.put_with_time(&ab(&[("1", "2"), ("3", "4")]), 10).unwrap();
    ring.put_with_time(&ab(&[("5", "6")]), 20).unwrap();
    let mut cd = Table::with_columns(["C", "D"]);
    cd.add_row([("C", "7"), ("D", "8")]);
    ring.put_with_time(&cd, 30).unwrap();
    ring.close().unwrap();

    let opts = ExportOptions {
        separator: ',',
        ..ExportOptions::default()
    };
    let text = export_ring(&path, "t", &opts, StoreConfig::default()).unwrap();

    let (_dir2, path2) = scratch("s5b.dat");
    import_text(&path2, "t", &text, &ImportOptions {
        separator: ",".to_string(),
        ..ImportOptions::default()
    }, StoreConfig::default())
    .unwrap();

    let text2 = export_ring(&path2, "t", &opts, StoreConfig::default()).unwrap();
    assert_eq!(text, text2);

    let mut orig = TimeRing::open(&path, "t", StoreConfig::default()).unwrap();
    let mut copy = TimeRing::open(&path2, "t", StoreConfig::default()).unwrap();
    let spans_orig: Vec<_> = SpanTable::read(&mut orig).unwrap().unwrap().iter().collect();
    let spans_copy: Vec<_> = SpanTable::read(&mut copy).unwrap().unwrap().iter().collect();
    assert_eq!(spans_orig.len(), spans_copy.len());
    for (a, b) in spans_orig.iter().zip(&spans_copy) {
        assert_eq!((a.from, a.to), (b.from, b.to));
    }
}

/// E7: purge on a bounded ring trims both the samples and the span
/// record.
#[test]
fn purge_trims_ring_and_spans() {
    let (_dir, path) = scratch("s7.dat");
    let mut ring = TableRing::create(&path, "t", "", 2, 0, StoreConfig::default()).unwrap();
    for t in 1..=5u32 {
        let mut tab = Table::with_columns(["v"]);
        tab.add_row([("v", t.to_string().as_str())]);
        ring.put_with_time(&tab, t).unwrap();
    }
    ring.purge(4).unwrap();

    let stat = ring.stat().unwrap();
    assert_eq!(stat.oldest, 4);
    assert_eq!(stat.youngest, 5);

    let spans = SpanTable::read(ring.ring_mut()).unwrap().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans.latest().unwrap().from, 4);
}

/// Capacity law under a random-ish workload: the live range never
/// exceeds the slot count once any operation commits.
#[test]
fn capacity_bound_holds_across_workload() {
    let (_dir, path) = scratch("cap.dat");
    let mut ring = TimeRing::create(&path, "r", "", 4, 0, StoreConfig::default()).unwrap();
    for t in 1..=37u32 {
        ring.put_with_time(b"x", t).unwrap();
        let stat = ring.stat().unwrap();
        assert!(stat.youngest - stat.oldest + 1 <= 4);
        if t % 11 == 0 {
            ring.resize(2).unwrap();
            let stat = ring.stat().unwrap();
            assert!(stat.youngest - stat.oldest + 1 <= 2);
            ring.resize(4).unwrap();
        }
    }
}

/// The store file survives close/reopen cycles with rings intact.
#[test]
fn reopen_preserves_ring_contents() {
    let (_dir, path) = scratch("reopen.dat");
    let mut ring = TableRing::create(&path, "t", "kept", 0, 60, StoreConfig::default()).unwrap();
    ring.put_with_time(&ab(&[("1", "2")]), 10).unwrap();
    ring.close().unwrap();

    let mut ring = TableRing::open(&path, "t", StoreConfig::default()).unwrap();
    ring.goto_oldest().unwrap();
    let tab = ring.get(true).unwrap().unwrap();
    assert_eq!(tab.cell(0, "A"), Some("1"));
    assert_eq!(tab.cell(0, "_seq"), Some("1"));
    assert_eq!(ring.stat().unwrap().duration, 60);
}
