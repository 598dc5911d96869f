//! Ring-Store: the unified ring API with human-level metadata.
//!
//! On top of a table ring, the ring-store keeps a directory of every
//! ring in the file (`__rings`), a store-wide info record (`__rsinfo`:
//! generation and ring counter), a header-hash table (`__hdr_<hash>`,
//! one record per distinct schema) and a per-ring sample index
//! (`__index_<ring>`: seq, time, dur, hash). Every put reserves the
//! header hash, appends the index row and writes the sample in one
//! write transaction; eviction and purge prune the index in that same
//! transaction.

use crate::error::RingError;
use crate::ring::{self, now, open_or_create_store, RingStat, Seconds};
use crate::span::SPAN_PREFIX;
use crate::tabring::{header_text, TableRing};
use diskstore::{Mode, Store, StoreConfig, TxnMode};
use tabular::{ScanOptions, Table};

const RSINFO_KEY: &str = "__rsinfo";
const RINGS_KEY: &str = "__rings";
const HDR_PREFIX: &str = "__hdr_";
const INDEX_PREFIX: &str = "__index_";

fn hdr_key(hash: &str) -> String {
    format!("{HDR_PREFIX}{hash}")
}

fn index_key(ring: &str) -> String {
    format!("{INDEX_PREFIX}{ring}")
}

fn header_hash(header: &str) -> String {
    format!("{:08x}", crc32fast::hash(header.as_bytes()))
}

/// Store-wide counters kept under `__rsinfo`.
#[derive(Debug, Clone, Copy, Default)]
struct RsInfo {
    /// Bumped whenever a ring-store handle opens the file for writing.
    generation: u64,
    /// Total rings ever created; a ring's id is its creation count.
    ring_counter: u64,
}

impl RsInfo {
    fn encode(&self) -> Vec<u8> {
        format!("{}|{}", self.generation, self.ring_counter).into_bytes()
    }

    fn decode(raw: &[u8]) -> Result<Self, RingError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| RingError::Corrupt("rsinfo record is not text".to_string()))?;
        let mut fields = text.split('|');
        let mut num = |what: &str| -> Result<u64, RingError> {
            fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| RingError::Corrupt(format!("rsinfo {what}")))
        };
        Ok(Self {
            generation: num("generation")?,
            ring_counter: num("ring counter")?,
        })
    }
}

fn read_rsinfo(store: &mut Store) -> Result<RsInfo, RingError> {
    match store.get(RSINFO_KEY)? {
        Some(raw) => RsInfo::decode(&raw),
        None => Ok(RsInfo::default()),
    }
}

fn write_rsinfo(store: &mut Store, info: RsInfo) -> Result<(), RingError> {
    store.put(RSINFO_KEY, &info.encode())?;
    Ok(())
}

const DIR_COLS: [&str; 7] = ["id", "name", "long", "about", "slots", "dur", "generation"];

fn read_directory(store: &mut Store) -> Result<Table, RingError> {
    let mut tab = Table::with_columns(DIR_COLS);
    if let Some(raw) = store.get(RINGS_KEY)? {
        let text = String::from_utf8(raw)
            .map_err(|_| RingError::Corrupt("ring directory is not text".to_string()))?;
        tab.scan(&text, &ScanOptions::new("\t"))?;
    }
    Ok(tab)
}

fn write_directory(store: &mut Store, tab: &Table) -> Result<(), RingError> {
    store.put(RINGS_KEY, tab.out_body('\t').as_bytes())?;
    Ok(())
}

const INDEX_COLS: [&str; 4] = ["seq", "time", "dur", "hash"];

fn read_index(store: &mut Store, ring: &str) -> Result<Table, RingError> {
    let mut tab = Table::with_columns(INDEX_COLS);
    if let Some(raw) = store.get(&index_key(ring))? {
        let text = String::from_utf8(raw)
            .map_err(|_| RingError::Corrupt("ring index is not text".to_string()))?;
        tab.scan(&text, &ScanOptions::new("\t"))?;
    }
    Ok(tab)
}

fn write_index(store: &mut Store, ring: &str, tab: &Table) -> Result<(), RingError> {
    store.put(&index_key(ring), tab.out_body('\t').as_bytes())?;
    Ok(())
}

/// Drops index rows whose sequence fell below the ring's oldest.
fn prune_index(tab: &mut Table, oldest: u64) -> Result<(), RingError> {
    tab.first();
    while !tab.beyond_end() {
        let seq: u64 = tab
            .current_cell("seq")
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| RingError::Corrupt("index seq cell".to_string()))?;
        if seq < oldest {
            tab.remove_current_row()?;
        } else {
            tab.next();
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// DIRECTORY QUERIES (shared by full and partial opens)
// ---------------------------------------------------------------------

fn lsrings_of(store: &mut Store) -> Result<Table, RingError> {
    let dir = read_directory(store)?;
    let mut out = Table::with_columns([
        "id", "name", "long", "about", "slots", "dur", "oldest", "youngest",
    ]);
    for id in dir.row_ids() {
        let Some(name) = dir.cell(id, "name").map(str::to_string) else {
            continue;
        };
        let meta = ring::read_meta_of(store, &name)?;
        let (oldest, youngest) = meta.map_or((String::new(), String::new()), |m| {
            (m.oldest.to_string(), m.youngest.to_string())
        });
        let mut row: Vec<(String, Option<String>)> = Vec::new();
        for col in ["id", "name", "long", "about", "slots", "dur"] {
            row.push((col.to_string(), dir.cell(id, col).map(str::to_string)));
        }
        row.push(("oldest".to_string(), Some(oldest)));
        row.push(("youngest".to_string(), Some(youngest)));
        out.add_row_cells(row);
    }
    Ok(out)
}

fn inforings_of(store: &mut Store) -> Result<Table, RingError> {
    let base = lsrings_of(store)?;
    let mut out = Table::with_columns([
        "id", "name", "long", "about", "slots", "dur", "oldest", "oldest_t", "youngest",
        "youngest_t",
    ]);
    for id in base.row_ids() {
        let Some(name) = base.cell(id, "name").map(str::to_string) else {
            continue;
        };
        let mut row: Vec<(String, Option<String>)> = Vec::new();
        for col in ["id", "name", "long", "about", "slots", "dur", "oldest", "youngest"] {
            row.push((col.to_string(), base.cell(id, col).map(str::to_string)));
        }
        for (edge, col) in [("oldest", "oldest_t"), ("youngest", "youngest_t")] {
            let time = match base.cell(id, edge).and_then(|c| c.parse::<u64>().ok()) {
                Some(seq) => ring::sample_time_of(store, &name, seq)?
                    .map(|t| t.to_string()),
                None => None,
            };
            row.push((col.to_string(), time));
        }
        out.add_row_cells(row);
    }
    Ok(out)
}

fn info_super_of(store: &mut Store) -> Result<Table, RingError> {
    let info = read_rsinfo(store)?;
    let sb = store.superblock().clone();
    let tz = chrono::Local::now().offset().to_string();
    let mut tab = Table::with_columns([
        "version", "created", "os", "node", "timezone", "generation", "ring counter",
    ]);
    tab.add_row([
        ("version", sb.version.to_string().as_str()),
        ("created", sb.created.to_string().as_str()),
        ("os", sb.os.as_str()),
        ("node", sb.node.as_str()),
        ("timezone", tz.as_str()),
        ("generation", info.generation.to_string().as_str()),
        ("ring counter", info.ring_counter.to_string().as_str()),
    ]);
    Ok(tab)
}

fn info_headers_of(store: &mut Store) -> Result<Table, RingError> {
    let hits = store.search(Some(&format!("^{HDR_PREFIX}")), None)?;
    let mut tab = Table::with_columns(["hash", "header"]);
    for (key, value) in hits {
        let hash = key[HDR_PREFIX.len()..].to_string();
        let header = String::from_utf8_lossy(&value).into_owned();
        tab.add_row([("hash", hash.as_str()), ("header", header.as_str())]);
    }
    Ok(tab)
}

// ---------------------------------------------------------------------
// PARTIAL OPEN
// ---------------------------------------------------------------------

/// A ring-store file opened without naming a ring: directory queries,
/// info dumps and space accounting only.
pub struct RingDir {
    store: Store,
}

impl RingDir {
    /// Opens a store file for directory work.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        mode: Mode,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        Ok(Self {
            store: Store::open(path, mode, config)?,
        })
    }

    /// Tabular directory of all rings.
    pub fn lsrings(&mut self) -> Result<Table, RingError> {
        lsrings_of(&mut self.store)
    }

    /// Directory with timing columns.
    pub fn inforings(&mut self) -> Result<Table, RingError> {
        inforings_of(&mut self.store)
    }

    /// The store-wide superblock and counters as a one-row table.
    pub fn info_super(&mut self) -> Result<Table, RingError> {
        info_super_of(&mut self.store)
    }

    /// The header-hash table.
    pub fn info_headers(&mut self) -> Result<Table, RingError> {
        info_headers_of(&mut self.store)
    }

    /// The per-sample index of one ring.
    pub fn info_index(&mut self, ring: &str) -> Result<Table, RingError> {
        read_index(&mut self.store, ring)
    }

    /// Bytes the store occupies on disk.
    pub fn footprint(&self) -> Result<u64, RingError> {
        Ok(self.store.footprint()?)
    }

    /// Bytes available for growth.
    pub fn remain(&self) -> Result<u64, RingError> {
        Ok(self.store.remain()?)
    }

    /// Completes the open by naming a ring.
    pub fn open_ring(self, ring: &str) -> Result<RingStore, RingError> {
        RingStore::open_in(self.store, ring)
    }

    /// Gives the underlying store back.
    pub fn into_store(self) -> Store {
        self.store
    }
}

// ---------------------------------------------------------------------
// FULL OPEN
// ---------------------------------------------------------------------

/// A fully-open ring: the table-ring surface plus directory metadata.
pub struct RingStore {
    ring: TableRing,
    name: String,
}

impl RingStore {
    /// Creates a ring with metadata, creating the store file if absent.
    pub fn create(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        long_name: &str,
        about: &str,
        slots: u32,
        duration: u32,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        let store = open_or_create_store(path.as_ref(), config)?;
        Self::create_in(store, ring, long_name, about, slots, duration)
    }

    /// Creates a ring with metadata in an already-open store. The
    /// directory row, the counters and the ring itself land in one
    /// write transaction.
    pub fn create_in(
        mut store: Store,
        ring: &str,
        long_name: &str,
        about: &str,
        slots: u32,
        duration: u32,
    ) -> Result<Self, RingError> {
        let joined = store.in_transaction();
        if !joined {
            store.begin(TxnMode::Write)?;
        }
        let prepared = (|| -> Result<(), RingError> {
            if ring::read_meta_of(&mut store, ring)?.is_some() {
                return Err(RingError::AlreadyExists(ring.to_string()));
            }
            let mut info = read_rsinfo(&mut store)?;
            info.generation += 1;
            info.ring_counter += 1;
            write_rsinfo(&mut store, info)?;

            let mut dir = read_directory(&mut store)?;
            dir.add_row([
                ("id", info.ring_counter.to_string().as_str()),
                ("name", ring),
                ("long", long_name),
                ("about", about),
                ("slots", slots.to_string().as_str()),
                ("dur", duration.to_string().as_str()),
                ("generation", info.generation.to_string().as_str()),
            ]);
            write_directory(&mut store, &dir)?;
            Ok(())
        })();

        match prepared {
            Err(e) => {
                if !joined {
                    let _ = store.commit();
                }
                Err(e)
            }
            Ok(()) => {
                // joins the open transaction, then we close it
                let tabring = TableRing::create_in(store, ring, about, slots, duration)?;
                let mut rs = Self {
                    ring: tabring,
                    name: ring.to_string(),
                };
                if !joined {
                    rs.store_mut().commit()?;
                }
                Ok(rs)
            }
        }
    }

    /// Opens an existing ring read/write.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        ring: &str,
        config: StoreConfig,
    ) -> Result<Self, RingError> {
        let store = Store::open(path, Mode::Write, config)?;
        Self::open_in(store, ring)
    }

    /// Opens an existing ring in an already-open store. A writable open
    /// advances the store generation.
    pub fn open_in(mut store: Store, ring: &str) -> Result<Self, RingError> {
        if store.mode() == Mode::Write && !store.in_transaction() {
            let mut info = read_rsinfo(&mut store)?;
            info.generation += 1;
            write_rsinfo(&mut store, info)?;
        }
        Ok(Self {
            ring: TableRing::open_in(store, ring)?,
            name: ring.to_string(),
        })
    }

    /// The ring's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn store_mut(&mut self) -> &mut Store {
        self.ring.ring_mut().store_mut()
    }

    fn with_txn<T>(
        &mut self,
        mode: TxnMode,
        f: impl FnOnce(&mut Self) -> Result<T, RingError>,
    ) -> Result<T, RingError> {
        if self.store_mut().in_transaction() {
            return f(self);
        }
        self.store_mut().begin(mode)?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.store_mut().commit()?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.store_mut().commit();
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------
    // SAMPLES
    // ---------------------------------------------------------------------

    /// Appends a table sample stamped with the current time.
    pub fn put(&mut self, tab: &Table) -> Result<u64, RingError> {
        self.put_with_time(tab, now())
    }

    /// Appends a table sample: header hash reservation, index row and
    /// sample write are one transaction.
    pub fn put_with_time(&mut self, tab: &Table, time: Seconds) -> Result<u64, RingError> {
        let header = header_text(tab);
        let hash = header_hash(&header);
        let name = self.name.clone();

        self.with_txn(TxnMode::Write, |rs| {
            // reserve the schema: unseen headers cost one record
            let hkey = hdr_key(&hash);
            if rs.store_mut().get(&hkey)?.is_none() {
                rs.store_mut().put(&hkey, header.as_bytes())?;
            }

            let seq = rs.ring.put_with_time(tab, time)?;

            let meta = rs.ring.ring_mut().read_meta()?;
            let mut index = read_index(rs.store_mut(), &name)?;
            index.add_row([
                ("seq", seq.to_string().as_str()),
                ("time", time.to_string().as_str()),
                ("dur", meta.duration.to_string().as_str()),
                ("hash", hash.as_str()),
            ]);
            prune_index(&mut index, meta.oldest)?;
            write_index(rs.store_mut(), &name, &index)?;
            Ok(seq)
        })
    }

    /// See [`TableRing::get`].
    pub fn get(&mut self, advance: bool) -> Result<Option<Table>, RingError> {
        self.ring.get(advance)
    }

    /// See [`TableRing::mget`].
    pub fn mget(&mut self, n: usize) -> Result<Option<Table>, RingError> {
        self.ring.mget(n)
    }

    /// See [`TableRing::get_all`].
    pub fn get_all(&mut self) -> Result<Option<Table>, RingError> {
        self.ring.get_all()
    }

    // ---------------------------------------------------------------------
    // CURSOR & MAINTENANCE
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

    /// Changes the slot count; the index follows any eviction.
    pub fn resize(&mut self, new_slots: u32) -> Result<(), RingError> {
        let name = self.name.clone();
        self.with_txn(TxnMode::Write, |rs| {
            rs.ring.resize(new_slots)?;
            let meta = rs.ring.ring_mut().read_meta()?;
            let mut index = read_index(rs.store_mut(), &name)?;
            prune_index(&mut index, meta.oldest)?;
            write_index(rs.store_mut(), &name, &index)?;
            rs.patch_directory(|dir, id| {
                dir.replace_cell(id, "slots", Some(new_slots.to_string()))
            })?;
            Ok(())
        })
    }

    /// Drops samples below `before_seq`; spans and index follow.
    pub fn purge(&mut self, before_seq: u64) -> Result<u64, RingError> {
        let name = self.name.clone();
        self.with_txn(TxnMode::Write, |rs| {
            let dropped = rs.ring.purge(before_seq)?;
            let meta = rs.ring.ring_mut().read_meta()?;
            let mut index = read_index(rs.store_mut(), &name)?;
            prune_index(&mut index, meta.oldest)?;
            write_index(rs.store_mut(), &name, &index)?;
            Ok(dropped)
        })
    }

    // ---------------------------------------------------------------------
    // METADATA
    // ---------------------------------------------------------------------

    fn patch_directory(
        &mut self,
        patch: impl FnOnce(&mut Table, u64) -> Result<(), tabular::TableError>,
    ) -> Result<(), RingError> {
        let name = self.name.clone();
        self.with_txn(TxnMode::Write, |rs| {
            let mut dir = read_directory(rs.store_mut())?;
            let row = dir
                .row_ids()
                .into_iter()
                .find(|id| dir.cell(*id, "name") == Some(name.as_str()))
                .ok_or_else(|| RingError::NotFound(name.clone()))?;
            patch(&mut dir, row)?;
            write_directory(rs.store_mut(), &dir)?;
            Ok(())
        })
    }

    /// Changes the ring's long name.
    pub fn change_long_name(&mut self, long_name: &str) -> Result<(), RingError> {
        let value = long_name.to_string();
        self.patch_directory(move |dir, id| dir.replace_cell(id, "long", Some(value)))
    }

    /// Changes the ring's free-form comment.
    pub fn change_about(&mut self, about: &str) -> Result<(), RingError> {
        let value = about.to_string();
        self.patch_directory(move |dir, id| dir.replace_cell(id, "about", Some(value)))
    }

    /// Changes the seconds-per-sample duration (0 = irregular).
    pub fn change_duration(&mut self, duration: u32) -> Result<(), RingError> {
        let name = self.name.clone();
        self.with_txn(TxnMode::Write, |rs| {
            let mut meta = rs
                .ring
                .ring_mut()
                .read_meta()?;
            meta.duration = duration;
            ring::write_meta_of(rs.store_mut(), &name, &meta)?;
            rs.patch_directory(|dir, id| {
                dir.replace_cell(id, "dur", Some(duration.to_string()))
            })
        })
    }

    /// Renames the ring, moving every record it owns to the new name.
    pub fn change_name(&mut self, new_name: &str) -> Result<(), RingError> {
        let old = self.name.clone();
        let new = new_name.to_string();
        self.with_txn(TxnMode::Write, |rs| {
            if ring::read_meta_of(rs.store_mut(), &new)?.is_some() {
                return Err(RingError::AlreadyExists(new.clone()));
            }
            let meta = rs
                .ring
                .ring_mut()
                .read_meta()?;

            // samples
            for seq in meta.oldest..=meta.youngest.max(meta.oldest) {
                let old_key = ring::sample_key(&old, seq);
                if let Some(value) = rs.store_mut().get(&old_key)? {
                    rs.store_mut().put(&ring::sample_key(&new, seq), &value)?;
                    rs.store_mut().remove(&old_key)?;
                }
            }
            // span record
            let old_span = format!("{SPAN_PREFIX}{old}");
            if let Some(value) = rs.store_mut().get(&old_span)? {
                rs.store_mut().put(&format!("{SPAN_PREFIX}{new}"), &value)?;
                rs.store_mut().remove(&old_span)?;
            }
            // index record
            let old_index = index_key(&old);
            if let Some(value) = rs.store_mut().get(&old_index)? {
                rs.store_mut().put(&index_key(&new), &value)?;
                rs.store_mut().remove(&old_index)?;
            }
            // meta last, so a failure above leaves the old name openable
            ring::write_meta_of(rs.store_mut(), &new, &meta)?;
            rs.store_mut().remove(&ring::meta_key(&old))?;

            rs.patch_directory(|dir, id| {
                dir.replace_cell(id, "name", Some(new.clone()))
            })?;
            Ok(())
        })?;

        self.name = new_name.to_string();
        self.ring.ring_mut().set_name(new_name);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // DIRECTORY VIEWS
    // ---------------------------------------------------------------------

    /// Tabular directory of all rings in the store.
    pub fn lsrings(&mut self) -> Result<Table, RingError> {
        let store = self.store_mut();
        lsrings_of(store)
    }

    /// Directory with timing columns.
    pub fn inforings(&mut self) -> Result<Table, RingError> {
        inforings_of(self.store_mut())
    }

    /// The store superblock and counters.
    pub fn info_super(&mut self) -> Result<Table, RingError> {
        info_super_of(self.store_mut())
    }

    /// The raw ring directory table.
    pub fn info_rings(&mut self) -> Result<Table, RingError> {
        read_directory(self.store_mut())
    }

    /// The header-hash table.
    pub fn info_headers(&mut self) -> Result<Table, RingError> {
        info_headers_of(self.store_mut())
    }

    /// This ring's per-sample index.
    pub fn info_index(&mut self) -> Result<Table, RingError> {
        let name = self.name.clone();
        read_index(self.store_mut(), &name)
    }

    /// Bytes the store occupies on disk.
    pub fn footprint(&mut self) -> Result<u64, RingError> {
        Ok(self.store_mut().footprint()?)
    }

    /// Bytes available for growth.
    pub fn remain(&mut self) -> Result<u64, RingError> {
        Ok(self.store_mut().remain()?)
    }

    /// Closes the ring and its store.
    pub fn close(self) -> Result<(), RingError> {
        self.ring.close()
    }

    /// Gives the underlying store back.
    pub fn into_store(self) -> Store {
        self.ring.into_store()
    }

    /// Removes the ring, its records, its directory row, and any header
    /// records no other ring references.
    pub fn destroy(mut self) -> Result<Store, RingError> {
        let name = self.name.clone();

        self.store_mut().begin(TxnMode::Write)?;

        // directory row and index first
        let mut dir = read_directory(self.store_mut())?;
        dir.first();
        while !dir.beyond_end() {
            if dir.current_cell("name") == Some(name.as_str()) {
                dir.remove_current_row()?;
            } else {
                dir.next();
            }
        }
        write_directory(self.store_mut(), &dir)?;
        self.store_mut().remove(&index_key(&name))?;

        // ring records; destroy consumes the table ring and commits the
        // open transaction via the returned store
        let mut store = self.ring.destroy()?;

        // sweep header records no surviving index references
        let referenced: std::collections::BTreeSet<String> = {
            let mut set = std::collections::BTreeSet::new();
            let indexes = store.search(Some(&format!("^{INDEX_PREFIX}")), None)?;
            for (_, value) in indexes {
                let text = String::from_utf8_lossy(&value).into_owned();
                if let Ok(rows) = tabular::scan_fields(&text, "\t", false) {
                    for row in rows {
                        if let Some(hash) = row.get(3) {
                            set.insert(hash.clone());
                        }
                    }
                }
            }
            set
        };
        let headers = store.search(Some(&format!("^{HDR_PREFIX}")), None)?;
        for (key, _) in headers {
            let hash = &key[HDR_PREFIX.len()..];
            if !referenced.contains(hash) {
                store.remove(&key)?;
            }
        }

        if store.in_transaction() {
            store.commit()?;
        }
        Ok(store)
    }
}
