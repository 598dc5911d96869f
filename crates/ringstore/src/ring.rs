//! Time-Ring: a named circular buffer of timestamped samples inside a
//! key/value store.
//!
//! Per ring `R` the store carries `R.meta` (slots, oldest, youngest,
//! duration, description) and one record per live sample under
//! `R.<seq>`, the value being the sample blob behind an 8-byte
//! little-endian `(time, length)` prefix. Sequences start at 1 and are
//! never reused; when the ring is full the oldest sample is removed in
//! the same write transaction as the append. A per-opening cursor
//! tracks the next unread sequence and always satisfies
//! `oldest <= cursor <= youngest + 1`.

use crate::error::RingError;
use diskstore::{Mode, Store, StoreConfig, TxnMode};
use std::time::{SystemTime, UNIX_EPOCH};
use tabular::Table;

/// Epoch seconds, as carried on the wire.
pub type Seconds = u32;

/// One `(seq, time, blob)` record read from a ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub seq: u64,
    pub time: Seconds,
    pub data: Vec<u8>,
}

/// A ring's position counters, as reported by [`TimeRing::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStat {
    pub duration: u32,
    pub slots: u32,
    pub oldest: u64,
    pub oldest_time: Seconds,
    pub youngest: u64,
    pub youngest_time: Seconds,
    pub cursor: u64,
}

/// The ring's durable counters, stored under `<ring>.meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RingMeta {
    pub slots: u32,
    /// Oldest live sequence; `youngest + 1` when the ring is empty.
    pub oldest: u64,
    /// Youngest live sequence; 0 before the first put.
    pub youngest: u64,
    pub duration: u32,
    pub description: String,
}

impl RingMeta {
    fn new(slots: u32, duration: u32, description: &str) -> Self {
        Self {
            slots,
            oldest: 1,
            youngest: 0,
            duration,
            description: description.to_string(),
        }
    }

    /// Number of live samples.
    pub fn count(&self) -> u64 {
        if self.youngest >= self.oldest {
            self.youngest - self.oldest + 1
        } else {
            0
        }
    }

    fn encode(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.slots, self.oldest, self.youngest, self.duration, self.description
        )
        .into_bytes()
    }

    fn decode(raw: &[u8]) -> Result<Self, RingError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| RingError::Corrupt("ring meta is not text".to_string()))?;
        let mut fields = text.splitn(5, '|');
        let mut num = |what: &str| -> Result<u64, RingError> {
            fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| RingError::Corrupt(format!("ring meta {what}")))
        };
        let slots = num("slots")? as u32;
        let oldest = num("oldest")?;
        let youngest = num("youngest")?;
        let duration = num("duration")? as u32;
        let description = fields.next().unwrap_or("").to_string();
        Ok(Self {
            slots,
            oldest,
            youngest,
            duration,
            description,
        })
    }
}

pub(crate) fn meta_key(ring: &str) -> String {
    format!("{ring}.meta")
}

pub(crate) fn sample_key(ring: &str, seq: u64) -> String {
    format!("{ring}.{seq}")
}

/// Reads another ring's meta record out of an open store.
pub(crate) fn read_meta_of(store: &mut Store, ring: &str) -> Result<Option<RingMeta>, RingError> {
    match store.get(&meta_key(ring))? {
        Some(raw) => Ok(Some(RingMeta::decode(&raw)?)),
        None => Ok(None),
    }
}

/// Writes another ring's meta record into an open store.
pub(crate) fn write_meta_of(
    store: &mut Store,
    ring: &str,
    meta: &RingMeta,
) -> Result<(), RingError> {
    store.put(&meta_key(ring), &meta.encode())?;
    Ok(())
}

/// Insertion time of one sample of a ring in an open store.
pub(crate) fn sample_time_of(
    store: &mut Store,
    ring: &str,
    seq: u64,
) -> Result<Option<Seconds>, RingError> {
    match store.get(&sample_key(ring, seq))? {
        Some(raw) => Ok(Some(decode_sample(seq, &raw)?.0)),
        None => Ok(None),
    }
}

/// Encodes a sample value: `(time, length)` little-endian prefix, then
/// the blob.
fn encode_sample(time: Seconds, data: &[u8]) -> Vec<u8> {
    let mut value = Vec::with_capacity(8 + data.len());
    value.extend_from_slice(&time.to_le_bytes());
    value.extend_from_slice(&(data.len() as u32).to_le_bytes());
    value.extend_from_slice(data);
    value
}

fn decode_sample(seq: u64, raw: &[u8]) -> Result<(Seconds, Vec<u8>), RingError> {
    if raw.len() < 8 {
        return Err(RingError::Corrupt(format!("sample {seq} shorter than its prefix")));
    }
    let time = Seconds::from_le_bytes(raw[0..4].try_into().unwrap());
    let length = u32::from_le_bytes(raw[4..8].try_into().unwrap()) as usize;
    if raw.len() - 8 < length {
        return Err(RingError::Corrupt(format!("sample {seq} truncated")));
    }
    Ok((time, raw[8..8 + length].to_vec()))
}

/// Current wall clock in epoch seconds.
pub fn now() -> Seconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as Seconds)
}

/// An open ring handle. Owns its store; see [`TimeRing::into_store`].
pub struct TimeRing {
    store: Store,
    name: String,
    cursor: u64,
}

impl TimeRing {
    /// Creates a ring in the store file at `path`, creating the store
    /// itself if absent. Fails if the ring already exists.
    pub fn create(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        description: &str,
        slots: u32,
        duration: u32,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        let store = open_or_create_store(path.as_ref(), config)?;
        Self::create_in(store, ring, description, slots, duration)
    }

    /// Creates a ring in an already-open store.
    pub fn create_in(
        mut store: Store,
        ring: &str,
        description: &str,
        slots: u32,
        duration: u32,
    ) -> Result<Self, RingError> {
        let key = meta_key(ring);
        let fresh = RingMeta::new(slots, duration, description);

        let joined = store.in_transaction();
        if !joined {
            store.begin(TxnMode::Write)?;
        }
        let result = (|| -> Result<(), RingError> {
            if store.get(&key)?.is_some() {
                return Err(RingError::AlreadyExists(ring.to_string()));
            }
            store.put(&key, &fresh.encode())?;
            Ok(())
        })();
        if !joined {
            let commit = store.commit();
            result.and(commit.map_err(RingError::from))?;
        } else {
            result?;
        }

        Ok(Self {
            store,
            name: ring.to_string(),
            cursor: 1,
        })
    }

    /// Opens an existing ring read/write. Fails if the meta record is
    /// absent.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        let store = Store::open(path, Mode::Write, config)?;
        Self::open_in(store, ring)
    }

    /// Opens an existing ring in an already-open store.
    pub fn open_in(mut store: Store, ring: &str) -> Result<Self, RingError> {
        let raw = store
            .get(&meta_key(ring))?
            .ok_or_else(|| RingError::NotFound(ring.to_string()))?;
        let meta = RingMeta::decode(&raw)?;
        Ok(Self {
            store,
            name: ring.to_string(),
            cursor: meta.oldest,
        })
    }

    /// The ring's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-points the handle after a rename has moved the records.
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Gives the underlying store back.
    pub fn into_store(self) -> Store {
        self.store
    }

    /// The underlying store, e.g. for span reads in the same transaction.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Closes the ring and its store.
    pub fn close(self) -> Result<(), RingError> {
        self.store.close()?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // TRANSACTION PLUMBING
    // ---------------------------------------------------------------------

    /// Runs `f` inside a transaction, joining one already active on the
    /// store so composite operations stay atomic.
    pub(crate) fn with_txn<T>(
        &mut self,
        mode: TxnMode,
        f: impl FnOnce(&mut Self) -> Result<T, RingError>,
    ) -> Result<T, RingError> {
        if self.store.in_transaction() {
            return f(self);
        }
        self.store.begin(mode)?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(e) => {
                // release the lock; uncommitted records never surface
                let _ = self.store.commit();
                Err(e)
            }
        }
    }

    pub(crate) fn read_meta(&mut self) -> Result<RingMeta, RingError> {
        let raw = self
            .store
            .get(&meta_key(&self.name))?
            .ok_or_else(|| RingError::NotFound(self.name.clone()))?;
        RingMeta::decode(&raw)
    }

    fn write_meta(&mut self, meta: &RingMeta) -> Result<(), RingError> {
        let key = meta_key(&self.name);
        self.store.put(&key, &meta.encode())?;
        Ok(())
    }

    fn clamp_cursor(&mut self, meta: &RingMeta) {
        if self.cursor < meta.oldest {
            self.cursor = meta.oldest;
        }
        if self.cursor > meta.youngest + 1 {
            self.cursor = meta.youngest + 1;
        }
    }

    // ---------------------------------------------------------------------
    // WRITE PATH
    // ---------------------------------------------------------------------

    /// Appends a sample stamped with the current time.
    pub fn put(&mut self, data: &[u8]) -> Result<u64, RingError> {
        self.put_with_time(data, now())
    }

    /// Appends a sample with a caller-supplied time. The append and any
    /// eviction commit in a single write transaction. Returns the new
    /// sequence.
    pub fn put_with_time(&mut self, data: &[u8], time: Seconds) -> Result<u64, RingError> {
        self.with_txn(TxnMode::Write, |ring| {
            let mut meta = ring.read_meta()?;
            let seq = meta.youngest + 1;

            // evict to make room before the append lands
            if meta.slots > 0 {
                while meta.count() >= u64::from(meta.slots) {
                    let key = sample_key(&ring.name, meta.oldest);
                    ring.store.remove(&key)?;
                    meta.oldest += 1;
                }
            }

            let key = sample_key(&ring.name, seq);
            ring.store.put(&key, &encode_sample(time, data))?;
            meta.youngest = seq;
            ring.write_meta(&meta)?;
            ring.clamp_cursor(&meta);
            Ok(seq)
        })
    }

    // ---------------------------------------------------------------------
    // READ PATH
    // ---------------------------------------------------------------------

    /// Returns the sample at the cursor, advancing it when asked.
    /// `None` once the cursor passes the youngest sample.
    pub fn get(&mut self, advance: bool) -> Result<Option<Sample>, RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            ring.clamp_cursor(&meta);
            if ring.cursor > meta.youngest {
                return Ok(None);
            }
            let sample = ring.fetch(ring.cursor)?;
            if advance {
                ring.cursor += 1;
            }
            Ok(Some(sample))
        })
    }

    /// Reads up to `n` consecutive samples starting at the cursor,
    /// advancing it by the number read.
    pub fn mget_n(&mut self, n: usize) -> Result<Vec<Sample>, RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            ring.clamp_cursor(&meta);
            let mut out = Vec::new();
            while out.len() < n && ring.cursor <= meta.youngest {
                out.push(ring.fetch(ring.cursor)?);
                ring.cursor += 1;
            }
            Ok(out)
        })
    }

    /// As [`mget_n`](Self::mget_n), materialized as a table with
    /// `_seq`, `_time` and `value` columns.
    pub fn mget_t(&mut self, n: usize) -> Result<Table, RingError> {
        let samples = self.mget_n(n)?;
        let mut tab = Table::with_columns(["_seq", "_time", "value"]);
        for s in samples {
            let value = String::from_utf8_lossy(&s.data)
                .trim_end_matches('\0')
                .to_string();
            tab.add_row_cells(vec![
                ("_seq".to_string(), Some(s.seq.to_string())),
                ("_time".to_string(), Some(s.time.to_string())),
                ("value".to_string(), Some(value)),
            ]);
        }
        Ok(tab)
    }

    /// Insertion time of the sample at `seq`.
    pub(crate) fn get_time_of(&mut self, seq: u64) -> Result<Seconds, RingError> {
        Ok(self.fetch(seq)?.time)
    }

    fn fetch(&mut self, seq: u64) -> Result<Sample, RingError> {
        let key = sample_key(&self.name, seq);
        let raw = self
            .store
            .get(&key)?
            .ok_or_else(|| RingError::Corrupt(format!("live sample {seq} missing")))?;
        let (time, data) = decode_sample(seq, &raw)?;
        Ok(Sample { seq, time, data })
    }

    // ---------------------------------------------------------------------
    // CURSOR MOVEMENT
    // ---------------------------------------------------------------------

    /// Moves the cursor to an absolute sequence.
    pub fn goto(&mut self, seq: u64) -> Result<(), RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            if seq < meta.oldest || seq > meta.youngest + 1 {
                return Err(RingError::CursorOutOfRange {
                    seq,
                    oldest: meta.oldest,
                    youngest: meta.youngest,
                });
            }
            ring.cursor = seq;
            Ok(())
        })
    }

    /// Moves the cursor back `k` sequences.
    pub fn rewind(&mut self, k: u64) -> Result<(), RingError> {
        let target = self.cursor.saturating_sub(k);
        self.goto(target.max(1))
    }

    /// Moves the cursor forward `k` sequences.
    pub fn forward(&mut self, k: u64) -> Result<(), RingError> {
        self.goto(self.cursor + k)
    }

    /// Positions the cursor on the oldest live sample.
    pub fn goto_oldest(&mut self) -> Result<(), RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            ring.cursor = meta.oldest;
            Ok(())
        })
    }

    /// Positions the cursor on the youngest live sample.
    pub fn goto_youngest(&mut self) -> Result<(), RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            ring.cursor = if meta.youngest >= meta.oldest {
                meta.youngest
            } else {
                meta.oldest
            };
            Ok(())
        })
    }

    /// The ring's counters and this handle's cursor.
    pub fn stat(&mut self) -> Result<RingStat, RingError> {
        self.with_txn(TxnMode::Read, |ring| {
            let meta = ring.read_meta()?;
            ring.clamp_cursor(&meta);
            let oldest_time = if meta.count() > 0 {
                ring.fetch(meta.oldest)?.time
            } else {
                0
            };
            let youngest_time = if meta.count() > 0 {
                ring.fetch(meta.youngest)?.time
            } else {
                0
            };
            Ok(RingStat {
                duration: meta.duration,
                slots: meta.slots,
                oldest: meta.oldest,
                oldest_time,
                youngest: meta.youngest,
                youngest_time,
                cursor: ring.cursor,
            })
        })
    }

    // ---------------------------------------------------------------------
    // MAINTENANCE
    // ---------------------------------------------------------------------

    /// Changes the slot count; shrinking below the population evicts the
    /// oldest samples.
    pub fn resize(&mut self, new_slots: u32) -> Result<(), RingError> {
        self.with_txn(TxnMode::Write, |ring| {
            let mut meta = ring.read_meta()?;
            if new_slots > 0 {
                while meta.count() > u64::from(new_slots) {
                    let key = sample_key(&ring.name, meta.oldest);
                    ring.store.remove(&key)?;
                    meta.oldest += 1;
                }
            }
            meta.slots = new_slots;
            ring.write_meta(&meta)?;
            ring.clamp_cursor(&meta);
            Ok(())
        })
    }

    /// Drops every sample with a sequence below `before_seq`.
    pub fn purge(&mut self, before_seq: u64) -> Result<u64, RingError> {
        self.with_txn(TxnMode::Write, |ring| {
            let mut meta = ring.read_meta()?;
            let stop = before_seq.min(meta.youngest + 1);
            let mut dropped = 0;
            while meta.oldest < stop {
                let key = sample_key(&ring.name, meta.oldest);
                if ring.store.remove(&key)? {
                    dropped += 1;
                }
                meta.oldest += 1;
            }
            ring.write_meta(&meta)?;
            ring.clamp_cursor(&meta);
            Ok(dropped)
        })
    }

    /// Removes the ring and all its records from the store, returning
    /// the store.
    pub fn destroy(mut self) -> Result<Store, RingError> {
        self.with_txn(TxnMode::Write, |ring| {
            let meta = ring.read_meta()?;
            for seq in meta.oldest..=meta.youngest.max(meta.oldest) {
                let key = sample_key(&ring.name, seq);
                let _ = ring.store.remove(&key)?;
            }
            ring.store.remove(&meta_key(&ring.name))?;
            let span_key = format!("{}{}", crate::span::SPAN_PREFIX, ring.name);
            let _ = ring.store.remove(&span_key)?;
            Ok(())
        })?;
        Ok(self.store)
    }
}

pub(crate) fn open_or_create_store(
    path: &std::path::Path,
    config: StoreConfig,
) -> Result<Store, RingError> {
    match Store::open(path, Mode::Write, config) {
        Ok(store) => Ok(store),
        Err(diskstore::StoreError::NotFound(_)) => {
            Ok(Store::create(path, config)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.ring.dat");
        (dir, path)
    }

    #[test]
    fn test_create_open_close() {
        let (_dir, path) = scratch();
        let ring = TimeRing::create(&path, "cpu", "processor load", 10, 60,
                                    StoreConfig::default()).unwrap();
        ring.close().unwrap();

        let ring = TimeRing::open(&path, "cpu", StoreConfig::default()).unwrap();
        assert_eq!(ring.name(), "cpu");
    }

    #[test]
    fn test_create_duplicate_fails() {
        let (_dir, path) = scratch();
        let ring = TimeRing::create(&path, "cpu", "", 10, 0, StoreConfig::default()).unwrap();
        let store = ring.into_store();
        assert!(matches!(
            TimeRing::create_in(store, "cpu", "", 10, 0),
            Err(RingError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_open_missing_ring_fails() {
        let (_dir, path) = scratch();
        TimeRing::create(&path, "cpu", "", 10, 0, StoreConfig::default())
            .unwrap()
            .close()
            .unwrap();
        assert!(matches!(
            TimeRing::open(&path, "nosuch", StoreConfig::default()),
            Err(RingError::NotFound(_))
        ));
    }

    #[test]
    fn test_eviction_at_capacity() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 3, 0, StoreConfig::default()).unwrap();
        for (i, blob) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            let seq = ring.put_with_time(*blob, 100 + i as Seconds).unwrap();
            assert_eq!(seq, i as u64 + 1);
        }
        let stat = ring.stat().unwrap();
        assert_eq!(stat.oldest, 2);
        assert_eq!(stat.youngest, 4);

        ring.goto_oldest().unwrap();
        let all = ring.mget_n(10).unwrap();
        let blobs: Vec<&[u8]> = all.iter().map(|s| s.data.as_slice()).collect();
        assert_eq!(blobs, [b"b", b"c", b"d"]);
    }

    #[test]
    fn test_unbounded_ring_keeps_everything() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        for t in 1..=100u32 {
            ring.put_with_time(format!("s{t}").as_bytes(), t).unwrap();
        }
        let stat = ring.stat().unwrap();
        assert_eq!(stat.oldest, 1);
        assert_eq!(stat.youngest, 100);
        assert_eq!(stat.oldest_time, 1);
        assert_eq!(stat.youngest_time, 100);
    }

    #[test]
    fn test_cursor_get_and_advance() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        ring.put_with_time(b"one", 1).unwrap();
        ring.put_with_time(b"two", 2).unwrap();

        let s = ring.get(true).unwrap().unwrap();
        assert_eq!(s.seq, 1);
        assert_eq!(s.data, b"one");

        let s = ring.get(false).unwrap().unwrap();
        assert_eq!(s.seq, 2);
        let again = ring.get(true).unwrap().unwrap();
        assert_eq!(again.seq, 2);

        assert!(ring.get(true).unwrap().is_none());
    }

    #[test]
    fn test_cursor_movement_bounds() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        for t in 1..=5u32 {
            ring.put_with_time(b"x", t).unwrap();
        }
        ring.goto(3).unwrap();
        assert!(matches!(
            ring.goto(7),
            Err(RingError::CursorOutOfRange { seq: 7, .. })
        ));
        ring.goto(6).unwrap(); // youngest + 1 is legal
        ring.rewind(2).unwrap();
        assert_eq!(ring.stat().unwrap().cursor, 4);
        ring.forward(1).unwrap();
        assert_eq!(ring.stat().unwrap().cursor, 5);
        ring.goto_youngest().unwrap();
        assert_eq!(ring.stat().unwrap().cursor, 5);
        ring.goto_oldest().unwrap();
        assert_eq!(ring.stat().unwrap().cursor, 1);
    }

    #[test]
    fn test_cursor_clamps_after_eviction() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 2, 0, StoreConfig::default()).unwrap();
        ring.put_with_time(b"a", 1).unwrap();
        ring.goto_oldest().unwrap();
        for t in 2..=5u32 {
            ring.put_with_time(b"x", t).unwrap();
        }
        // oldest moved to 4; the cursor may not lag behind it
        let stat = ring.stat().unwrap();
        assert_eq!(stat.oldest, 4);
        assert!(stat.cursor >= stat.oldest);
    }

    #[test]
    fn test_resize_shrink_evicts() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        for t in 1..=5u32 {
            ring.put_with_time(b"x", t).unwrap();
        }
        ring.resize(2).unwrap();
        let stat = ring.stat().unwrap();
        assert_eq!(stat.slots, 2);
        assert_eq!(stat.oldest, 4);
        assert_eq!(stat.youngest, 5);
    }

    #[test]
    fn test_purge_drops_older_sequences() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        for t in 1..=5u32 {
            ring.put_with_time(b"x", t).unwrap();
        }
        let dropped = ring.purge(4).unwrap();
        assert_eq!(dropped, 3);
        let stat = ring.stat().unwrap();
        assert_eq!(stat.oldest, 4);
        assert_eq!(stat.youngest, 5);
    }

    #[test]
    fn test_sequences_monotonic_across_eviction() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 2, 0, StoreConfig::default()).unwrap();
        let mut last = 0;
        for t in 1..=10u32 {
            let seq = ring.put_with_time(b"x", t).unwrap();
            assert!(seq > last);
            last = seq;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_mget_t_table_shape() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        ring.put_with_time(b"hello", 42).unwrap();
        let tab = ring.mget_t(10).unwrap();
        assert_eq!(tab.column_names(), ["_seq", "_time", "value"]);
        assert_eq!(tab.cell(0, "_seq"), Some("1"));
        assert_eq!(tab.cell(0, "_time"), Some("42"));
        assert_eq!(tab.cell(0, "value"), Some("hello"));
    }

    #[test]
    fn test_destroy_removes_records() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "", 0, 0, StoreConfig::default()).unwrap();
        ring.put_with_time(b"x", 1).unwrap();
        let mut store = ring.destroy().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_two_rings_share_a_store() {
        let (_dir, path) = scratch();
        let ring_a =
            TimeRing::create(&path, "a", "", 0, 0, StoreConfig::default()).unwrap();
        let store = ring_a.into_store();
        let mut ring_b = TimeRing::create_in(store, "b", "", 0, 0).unwrap();
        ring_b.put_with_time(b"bee", 1).unwrap();

        let store = ring_b.into_store();
        let mut ring_a = TimeRing::open_in(store, "a").unwrap();
        assert!(ring_a.get(true).unwrap().is_none());
    }

    #[test]
    fn test_meta_survives_reopen() {
        let (_dir, path) = scratch();
        let mut ring =
            TimeRing::create(&path, "r", "sampled load", 7, 300, StoreConfig::default())
                .unwrap();
        ring.put_with_time(b"x", 9).unwrap();
        ring.close().unwrap();

        let mut ring = TimeRing::open(&path, "r", StoreConfig::default()).unwrap();
        let stat = ring.stat().unwrap();
        assert_eq!(stat.slots, 7);
        assert_eq!(stat.duration, 300);
        assert_eq!(stat.youngest, 1);
    }
}
