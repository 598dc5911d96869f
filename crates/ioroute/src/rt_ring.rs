//! The ring driver: channels onto ring-store rings.
//!
//! Addresses take the form `ring:file,ring[,duration]`. With a nonzero
//! `keep`, a missing ring is created with `keep` slots and the open
//! comment as its description; with `keep` of 0 only existing rings
//! open.

use crate::driver::{Access, Channel, Driver, OpenRequest, Tell};
use crate::error::RouteError;
use diskstore::StoreConfig;
use ringstore::{RingError, RingStore};
use tabular::Table;

/// Route driver for ring addresses (`ring:`).
pub struct RingDriver {
    config: StoreConfig,
}

impl Default for RingDriver {
    fn default() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }
}

impl RingDriver {
    /// A ring driver with custom store tunables.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

/// A parsed `file,ring[,duration]` suffix.
struct RingAddress {
    file: String,
    ring: String,
    duration: u32,
}

fn parse_suffix(url: &str, suffix: &str) -> Result<RingAddress, RouteError> {
    let mut parts = suffix.split(',');
    let file = parts.next().unwrap_or("");
    let ring = parts.next().unwrap_or("");
    if file.is_empty() || ring.is_empty() {
        return Err(RouteError::BadAddress {
            url: url.to_string(),
            reason: "expected file,ring[,duration]",
        });
    }
    let duration = match parts.next() {
        Some(d) => d.parse().map_err(|_| RouteError::BadAddress {
            url: url.to_string(),
            reason: "duration must be numeric",
        })?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(RouteError::BadAddress {
            url: url.to_string(),
            reason: "too many commas",
        });
    }
    Ok(RingAddress {
        file: file.to_string(),
        ring: ring.to_string(),
        duration,
    })
}

struct RingChannel {
    rs: RingStore,
}

impl Driver for RingDriver {
    fn prefix(&self) -> &'static str {
        "ring"
    }

    fn description(&self) -> &'static str {
        "ring store"
    }

    fn access(&self, suffix: &str, _mode: Access) -> bool {
        match parse_suffix("ring:", suffix) {
            Ok(addr) => std::path::Path::new(&addr.file).exists(),
            Err(_) => false,
        }
    }

    fn open(&self, req: &OpenRequest<'_>) -> Result<Box<dyn Channel>, RouteError> {
        let addr = parse_suffix(req.url, req.suffix)?;
        let rs = match RingStore::open(&addr.file, &addr.ring, self.config) {
            Ok(rs) => rs,
            Err(RingError::NotFound(_)) | Err(RingError::Store(diskstore::StoreError::NotFound(_))) => {
                if req.keep == 0 {
                    return Err(RouteError::NoSuchLocation(req.url.to_string()));
                }
                RingStore::create(
                    &addr.file,
                    &addr.ring,
                    req.comment,
                    req.comment,
                    req.keep,
                    addr.duration,
                    self.config,
                )?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Box::new(RingChannel { rs }))
    }
}

impl Channel for RingChannel {
    /// Raw text lands as a one-column, one-row table sample.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, RouteError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        let mut tab = Table::with_columns(["data"]);
        tab.add_row([("data", text.as_str())]);
        self.rs.put(&tab)?;
        Ok(bytes.len())
    }

    fn twrite(&mut self, tab: &Table) -> Result<(), RouteError> {
        self.rs.put(tab)?;
        Ok(())
    }

    fn tell(&mut self) -> Result<Tell, RouteError> {
        let stat = self.rs.stat()?;
        let empty = stat.youngest < stat.oldest;
        Ok(Tell {
            seq: if empty { -1 } else { stat.youngest as i64 },
            size: -1,
            mtime: if empty { -1 } else { i64::from(stat.youngest_time) },
        })
    }

    fn read(&mut self, seq: i64, offset: i64) -> Result<Vec<Vec<u8>>, RouteError> {
        let tab = self.tread(seq, offset)?;
        if tab.nrows() == 0 && tab.ncols() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![tab.out_table('\t', true, true).into_bytes()])
    }

    fn tread(&mut self, seq: i64, _offset: i64) -> Result<Table, RouteError> {
        if seq < 0 {
            return Ok(Table::new());
        }
        self.rs.goto(seq as u64)?;
        match self.rs.get(false)? {
            Some(tab) => Ok(tab),
            None => Ok(Table::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("rings.dat").to_str().unwrap().to_string();
        (dir, file)
    }

    fn req<'a>(url: &'a str, suffix: &'a str, keep: u32) -> OpenRequest<'a> {
        OpenRequest {
            url,
            suffix,
            comment: "made by test",
            password: None,
            keep,
        }
    }

    #[test]
    fn test_suffix_grammar() {
        let addr = parse_suffix("u", "a.dat,cpu,60").unwrap();
        assert_eq!(addr.file, "a.dat");
        assert_eq!(addr.ring, "cpu");
        assert_eq!(addr.duration, 60);

        let addr = parse_suffix("u", "a.dat,cpu").unwrap();
        assert_eq!(addr.duration, 0);

        assert!(parse_suffix("u", "a.dat").is_err());
        assert!(parse_suffix("u", "a.dat,cpu,abc").is_err());
        assert!(parse_suffix("u", "a.dat,cpu,1,2").is_err());
    }

    #[test]
    fn test_keep_creates_missing_ring() {
        let (_dir, file) = scratch();
        let suffix = format!("{file},cpu,60");
        let driver = RingDriver::default();

        assert!(matches!(
            driver.open(&req("ring:x", &suffix, 0)),
            Err(RouteError::NoSuchLocation(_))
        ));

        let mut ch = driver.open(&req("ring:x", &suffix, 10)).unwrap();
        assert_eq!(ch.tell().unwrap().seq, -1);
    }

    #[test]
    fn test_table_write_and_read_back() {
        let (_dir, file) = scratch();
        let suffix = format!("{file},cpu,60");
        let driver = RingDriver::default();
        let mut ch = driver.open(&req("ring:x", &suffix, 10)).unwrap();

        let mut tab = Table::with_columns(["load"]);
        tab.add_row([("load", "0.7")]);
        ch.twrite(&tab).unwrap();

        let tell = ch.tell().unwrap();
        assert_eq!(tell.seq, 1);
        assert_eq!(tell.size, -1);

        let back = ch.tread(tell.seq, 0).unwrap();
        assert_eq!(back.cell(0, "load"), Some("0.7"));
    }

    #[test]
    fn test_raw_write_becomes_data_sample() {
        let (_dir, file) = scratch();
        let suffix = format!("{file},log,0");
        let driver = RingDriver::default();
        let mut ch = driver.open(&req("ring:x", &suffix, 5)).unwrap();

        ch.write(b"something happened").unwrap();
        let back = ch.tread(1, 0).unwrap();
        assert_eq!(back.cell(0, "data"), Some("something happened"));
    }
}
