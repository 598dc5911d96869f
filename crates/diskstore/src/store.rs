//! The store proper: a single-file keyed record log.
//!
//! Records append to the file and become visible only once their
//! transaction's commit marker is durable, so a reopen after a crash
//! finds exactly the committed keys. Recovery stops at the first torn
//! record. An open handle moves between three states: open, in a read
//! transaction, in a write transaction; any call made without an
//! explicit transaction takes an implicit one around itself.
//!
//! Concurrency is cooperative over advisory file locks: shared for
//! readers, exclusive for writers, with a bounded retry budget from
//! [`StoreConfig`]. A handle is not shareable across threads without
//! external serialization.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::lock::{lock, unlock, LockKind};
use crate::superblock::{Superblock, SUPERBLOCK_KEY};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const KIND_PUT: u8 = 1;
const KIND_REMOVE: u8 = 2;
const KIND_COMMIT: u8 = 3;

/// Record header: crc32 + kind + key length + value length.
const HEADER_LEN: usize = 4 + 1 + 4 + 4;

/// How a store handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Transaction mode for [`Store::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Txn {
    None,
    Read,
    Write { dirty: bool },
}

/// A durable mapping from string keys to byte-string values, one file
/// per store.
pub struct Store {
    path: PathBuf,
    config: StoreConfig,
    file: File,
    mode: Mode,
    txn: Txn,
    index: BTreeMap<String, Vec<u8>>,
    /// (len, mtime) of the file the index reflects; revalidated under lock.
    index_stamp: Option<(u64, SystemTime)>,
    superblock: Superblock,
    /// Read-traversal position (last key handed out).
    cursor: Option<String>,
}

impl Store {
    /// Creates a new store file with the configured permission mode and
    /// writes its superblock atomically under the write lock.
    ///
    /// Fails with `AlreadyExists` if the path is already occupied.
    pub fn create(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(config.mode)
            .open(&path)
            .map_err(|e| map_open_err(e, &path))?;

        let superblock = Superblock::for_this_host();
        let mut store = Self {
            path,
            config,
            file,
            mode: Mode::Write,
            txn: Txn::None,
            index: BTreeMap::new(),
            index_stamp: None,
            superblock,
            cursor: None,
        };

        lock(&store.file, LockKind::Exclusive, &store.config)?;
        let result = store.write_superblock_locked();
        unlock(&store.file);
        result?;
        Ok(store)
    }

    fn write_superblock_locked(&mut self) -> Result<(), StoreError> {
        let encoded = self.superblock.encode();
        self.append_record(KIND_PUT, SUPERBLOCK_KEY, &encoded)?;
        self.append_record(KIND_COMMIT, "", &[])?;
        self.file.sync_all()?;
        self.index.insert(SUPERBLOCK_KEY.to_string(), encoded);
        self.stamp_index()?;
        Ok(())
    }

    /// Opens an existing store, rejecting files without the superblock
    /// magic or with a mismatched version.
    pub fn open(
        path: impl AsRef<Path>,
        mode: Mode,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(mode == Mode::Write)
            .open(&path)
            .map_err(|e| map_open_err(e, &path))?;

        let mut store = Self {
            path,
            config,
            file,
            mode,
            txn: Txn::None,
            index: BTreeMap::new(),
            index_stamp: None,
            superblock: Superblock::for_this_host(), // replaced below
            cursor: None,
        };

        lock(&store.file, LockKind::Shared, &store.config)?;
        let loaded = store.load_index();
        unlock(&store.file);
        loaded?;

        let path_str = store.path.display().to_string();
        let raw = store
            .index
            .get(SUPERBLOCK_KEY)
            .ok_or(StoreError::BadMagic(path_str.clone()))?;
        store.superblock = Superblock::decode(&path_str, raw)?;
        Ok(store)
    }

    /// The identity record this store was created with.
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How this handle was opened.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True while an explicit transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.txn != Txn::None
    }

    // ---------------------------------------------------------------------
    // TRANSACTIONS
    // ---------------------------------------------------------------------

    /// Starts a transaction: shared lock for `Read`, exclusive for
    /// `Write`. Everything until [`commit`](Self::commit) observes a
    /// stable snapshot of the file.
    pub fn begin(&mut self, mode: TxnMode) -> Result<(), StoreError> {
        if self.txn != Txn::None {
            return Err(StoreError::InvalidState("already in a transaction"));
        }
        let kind = match mode {
            TxnMode::Read => LockKind::Shared,
            TxnMode::Write => {
                if self.mode != Mode::Write {
                    return Err(StoreError::InvalidState(
                        "write transaction on read-only handle",
                    ));
                }
                LockKind::Exclusive
            }
        };
        lock(&self.file, kind, &self.config)?;
        if let Err(e) = self.load_index() {
            unlock(&self.file);
            return Err(e);
        }
        self.txn = match mode {
            TxnMode::Read => Txn::Read,
            TxnMode::Write => Txn::Write { dirty: false },
        };
        Ok(())
    }

    /// Ends the transaction, making a write transaction's records
    /// durable before the lock is released.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        match self.txn {
            Txn::None => return Err(StoreError::InvalidState("not in a transaction")),
            Txn::Write { dirty: true } => {
                self.append_record(KIND_COMMIT, "", &[])?;
                self.file.sync_all()?;
                self.stamp_index()?;
            }
            Txn::Write { dirty: false } | Txn::Read => {}
        }
        self.txn = Txn::None;
        self.cursor = None;
        unlock(&self.file);
        Ok(())
    }

    /// No rollback is provided; this is [`commit`](Self::commit).
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        self.commit()
    }

    /// Asks the store to compact: live records are rewritten to a fresh
    /// file which replaces the original. Callable only outside
    /// transactions.
    pub fn checkpoint(&mut self) -> Result<(), StoreError> {
        if self.txn != Txn::None {
            return Err(StoreError::InvalidState("checkpoint inside a transaction"));
        }
        if self.mode != Mode::Write {
            return Err(StoreError::InvalidState("checkpoint on read-only handle"));
        }

        lock(&self.file, LockKind::Exclusive, &self.config)?;
        let result = self.checkpoint_locked();
        unlock(&self.file);
        result
    }

    fn checkpoint_locked(&mut self) -> Result<(), StoreError> {
        self.load_index()?;

        let tmp_path = self.path.with_extension("ckpt");
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(self.config.mode)
            .open(&tmp_path)?;
        for (key, value) in &self.index {
            tmp.write_all(&encode_record(KIND_PUT, key, value))?;
        }
        tmp.write_all(&encode_record(KIND_COMMIT, "", &[]))?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        // the old fd now points at the unlinked file; swap in the new one
        let old = std::mem::replace(&mut self.file, tmp);
        drop(old);
        self.stamp_index()?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // KEYED ACCESS
    // ---------------------------------------------------------------------

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if key == SUPERBLOCK_KEY {
            return Err(StoreError::InvalidState("superblock key is reserved"));
        }
        self.put_raw(key, value)
    }

    fn put_raw(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self.txn {
            Txn::Read => return Err(StoreError::InvalidState("put inside a read transaction")),
            Txn::Write { .. } => {
                self.append_record(KIND_PUT, key, value)?;
                self.index.insert(key.to_string(), value.to_vec());
                self.txn = Txn::Write { dirty: true };
                Ok(())
            }
            Txn::None => {
                self.begin(TxnMode::Write)?;
                let result = self.put_raw(key, value);
                self.finish_implicit(result)
            }
        }
    }

    /// Fetches the value stored under `key`.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.txn {
            Txn::None => {
                self.begin(TxnMode::Read)?;
                let result = self.get(key);
                self.finish_implicit(result)
            }
            _ => Ok(self.index.get(key).cloned()),
        }
    }

    /// Removes `key`, reporting whether it was present.
    pub fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        if key == SUPERBLOCK_KEY {
            return Err(StoreError::InvalidState("superblock key is reserved"));
        }
        match self.txn {
            Txn::Read => Err(StoreError::InvalidState("remove inside a read transaction")),
            Txn::Write { .. } => {
                let present = self.index.remove(key).is_some();
                if present {
                    self.append_record(KIND_REMOVE, key, &[])?;
                    self.txn = Txn::Write { dirty: true };
                }
                Ok(present)
            }
            Txn::None => {
                self.begin(TxnMode::Write)?;
                let result = self.remove(key);
                self.finish_implicit(result)
            }
        }
    }

    /// Patches the superblock identity fields in place.
    pub fn update_superblock(
        &mut self,
        patch: impl FnOnce(&mut Superblock),
    ) -> Result<(), StoreError> {
        let mut sb = self.superblock.clone();
        patch(&mut sb);
        let encoded = sb.encode();
        self.put_raw(SUPERBLOCK_KEY, &encoded)?;
        self.superblock = sb;
        Ok(())
    }

    fn finish_implicit<T>(
        &mut self,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match result {
            Ok(v) => {
                self.commit()?;
                Ok(v)
            }
            Err(e) => {
                // release the lock; the missing commit marker voids writes
                let _ = self.commit();
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------
    // SEARCH & TRAVERSAL
    // ---------------------------------------------------------------------

    /// Sequentially scans for keys and/or values matching the given
    /// regular expressions; `None` matches everything. Values are
    /// matched as (lossy) text. The superblock never matches.
    pub fn search(
        &mut self,
        key_pattern: Option<&str>,
        value_pattern: Option<&str>,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let key_re = key_pattern.map(Regex::new).transpose()?;
        let value_re = value_pattern.map(Regex::new).transpose()?;

        if self.txn == Txn::None {
            self.begin(TxnMode::Read)?;
            let result = self.search_index(&key_re, &value_re);
            return self.finish_implicit(Ok(result));
        }
        Ok(self.search_index(&key_re, &value_re))
    }

    fn search_index(
        &self,
        key_re: &Option<Regex>,
        value_re: &Option<Regex>,
    ) -> Vec<(String, Vec<u8>)> {
        self.index
            .iter()
            .filter(|(k, _)| k.as_str() != SUPERBLOCK_KEY)
            .filter(|(k, v)| {
                let key_ok = key_re.as_ref().map_or(true, |re| re.is_match(k));
                let value_ok = value_re
                    .as_ref()
                    .map_or(true, |re| re.is_match(&String::from_utf8_lossy(v)));
                key_ok && value_ok
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Starts a read traversal of the whole store, skipping the
    /// superblock. Must be inside a transaction.
    pub fn read_first(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        if self.txn == Txn::None {
            return Err(StoreError::InvalidState("traversal outside a transaction"));
        }
        self.cursor = None;
        self.advance_cursor()
    }

    /// Continues a traversal started by [`read_first`](Self::read_first).
    pub fn read_next(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        if self.txn == Txn::None {
            return Err(StoreError::InvalidState("traversal outside a transaction"));
        }
        if self.cursor.is_none() {
            return Err(StoreError::InvalidState("read_next before read_first"));
        }
        self.advance_cursor()
    }

    /// Ends a traversal early.
    pub fn read_end(&mut self) {
        self.cursor = None;
    }

    fn advance_cursor(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        use std::ops::Bound;
        let range = match &self.cursor {
            None => (Bound::Unbounded, Bound::Unbounded),
            Some(last) => (Bound::Excluded(last.clone()), Bound::Unbounded),
        };
        let next = self
            .index
            .range::<String, _>(range)
            .find(|(k, _)| k.as_str() != SUPERBLOCK_KEY)
            .map(|(k, v)| (k.clone(), v.clone()));
        self.cursor = next.as_ref().map(|(k, _)| k.clone());
        Ok(next)
    }

    /// Keys currently live in the store, superblock excluded.
    pub fn keys(&mut self) -> Result<Vec<String>, StoreError> {
        if self.txn == Txn::None {
            self.begin(TxnMode::Read)?;
            let keys = self.keys_from_index();
            return self.finish_implicit(Ok(keys));
        }
        Ok(self.keys_from_index())
    }

    fn keys_from_index(&self) -> Vec<String> {
        self.index
            .keys()
            .filter(|k| k.as_str() != SUPERBLOCK_KEY)
            .cloned()
            .collect()
    }

    // ---------------------------------------------------------------------
    // SPACE
    // ---------------------------------------------------------------------

    /// Bytes the store file occupies on disk.
    pub fn footprint(&self) -> Result<u64, StoreError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Bytes available for the store to grow into, from the filesystem.
    pub fn remain(&self) -> Result<u64, StoreError> {
        use std::os::unix::ffi::OsStrExt;
        let cpath = std::ffi::CString::new(self.path.as_os_str().as_bytes())
            .map_err(|_| StoreError::InvalidState("path contains a nul byte"))?;
        let mut vfs: libc::statvfs = unsafe { std::mem::zeroed() };
        if unsafe { libc::statvfs(cpath.as_ptr(), &mut vfs) } != 0 {
            return Err(StoreError::Io(std::io::Error::last_os_error()));
        }
        Ok(vfs.f_bavail as u64 * vfs.f_bsize as u64)
    }

    /// Closes the handle; any open transaction is committed first.
    pub fn close(mut self) -> Result<(), StoreError> {
        if self.txn != Txn::None {
            self.commit()?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // RECORD LOG
    // ---------------------------------------------------------------------

    fn append_record(&mut self, kind: u8, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let record = encode_record(kind, key, value);
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&record)?;
        Ok(())
    }

    fn stamp_index(&mut self) -> Result<(), StoreError> {
        let meta = self.file.metadata()?;
        self.index_stamp = Some((meta.len(), meta.modified()?));
        Ok(())
    }

    /// Rebuilds the in-memory index from the record log. Reuses the
    /// previous index when the file is untouched since it was built.
    /// Only committed records apply; recovery stops at a torn tail.
    fn load_index(&mut self) -> Result<(), StoreError> {
        let meta = self.file.metadata()?;
        let stamp = (meta.len(), meta.modified()?);
        if self.index_stamp == Some(stamp) {
            return Ok(());
        }

        let file_len = meta.len();
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut index = BTreeMap::new();
        let mut batch: Vec<(u8, String, Vec<u8>)> = Vec::new();
        let mut pos: u64 = 0;

        loop {
            let mut header = [0u8; HEADER_LEN];
            match read_exact_or_eof(&mut reader, &mut header) {
                ReadOutcome::Eof | ReadOutcome::Short => break,
                ReadOutcome::Full => {}
            }
            let crc = u32::from_le_bytes(header[0..4].try_into().unwrap());
            let kind = header[4];
            let klen = u32::from_le_bytes(header[5..9].try_into().unwrap()) as u64;
            let vlen = u32::from_le_bytes(header[9..13].try_into().unwrap()) as u64;

            let body_len = klen + vlen;
            if pos + HEADER_LEN as u64 + body_len > file_len {
                break; // torn tail
            }
            let mut body = vec![0u8; body_len as usize];
            match read_exact_or_eof(&mut reader, &mut body) {
                ReadOutcome::Eof | ReadOutcome::Short => break,
                ReadOutcome::Full => {}
            }

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&header[4..]);
            hasher.update(&body);
            if hasher.finalize() != crc {
                break; // torn or damaged tail
            }

            pos += HEADER_LEN as u64 + body_len;

            match kind {
                KIND_COMMIT => {
                    for (k, key, value) in batch.drain(..) {
                        match k {
                            KIND_PUT => {
                                index.insert(key, value);
                            }
                            _ => {
                                index.remove(&key);
                            }
                        }
                    }
                }
                KIND_PUT | KIND_REMOVE => {
                    let (key_bytes, value_bytes) = body.split_at(klen as usize);
                    let key = String::from_utf8(key_bytes.to_vec()).map_err(|_| {
                        StoreError::Corrupt("record key is not valid UTF-8".to_string())
                    })?;
                    batch.push((kind, key, value_bytes.to_vec()));
                }
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "unknown record kind {other}"
                    )));
                }
            }
        }

        // records after the last commit marker never became visible
        self.index = index;
        self.index_stamp = Some(stamp);
        Ok(())
    }
}

fn encode_record(kind: u8, key: &str, value: &[u8]) -> Vec<u8> {
    let klen = key.len() as u32;
    let vlen = value.len() as u32;
    let mut record = Vec::with_capacity(HEADER_LEN + key.len() + value.len());
    record.extend_from_slice(&[0; 4]); // crc placeholder
    record.push(kind);
    record.extend_from_slice(&klen.to_le_bytes());
    record.extend_from_slice(&vlen.to_le_bytes());
    record.extend_from_slice(key.as_bytes());
    record.extend_from_slice(value);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&record[4..]);
    let crc = hasher.finalize();
    record[0..4].copy_from_slice(&crc.to_le_bytes());
    record
}

enum ReadOutcome {
    Full,
    Short,
    Eof,
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> ReadOutcome {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Short
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(_) => return ReadOutcome::Short,
        }
    }
    ReadOutcome::Full
}

fn map_open_err(e: std::io::Error, path: &Path) -> StoreError {
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.display().to_string()),
        ErrorKind::PermissionDenied => {
            StoreError::PermissionDenied(path.display().to_string())
        }
        _ => StoreError::Io(e),
    }
}
