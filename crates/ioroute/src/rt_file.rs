//! File drivers: append (`file:`) and overwrite (`fileov:`).

use crate::driver::{Access, Channel, Driver, OpenRequest, Tell};
use crate::error::RouteError;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tabular::Table;

/// Route driver for plain files. The `file:` personality appends; the
/// `fileov:` personality truncates on open.
pub struct FileDriver {
    overwrite: bool,
}

impl FileDriver {
    /// The appending `file:` driver.
    pub fn append() -> Self {
        Self { overwrite: false }
    }

    /// The truncating `fileov:` driver.
    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }
}

struct FileChannel {
    path: PathBuf,
    file: std::fs::File,
    append: bool,
}

impl Driver for FileDriver {
    fn prefix(&self) -> &'static str {
        if self.overwrite {
            "fileov"
        } else {
            "file"
        }
    }

    fn description(&self) -> &'static str {
        if self.overwrite {
            "file overwrite"
        } else {
            "file append"
        }
    }

    fn access(&self, suffix: &str, mode: Access) -> bool {
        match std::fs::metadata(suffix) {
            Ok(meta) => meta.is_file() || mode == Access::Read,
            Err(_) => false,
        }
    }

    fn open(&self, req: &OpenRequest<'_>) -> Result<Box<dyn Channel>, RouteError> {
        let path = PathBuf::from(req.suffix);
        let exists = path.exists();
        if !exists && req.keep == 0 {
            return Err(RouteError::NoSuchLocation(req.url.to_string()));
        }
        let mut options = OpenOptions::new();
        options.read(true).create(true);
        if self.overwrite {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(&path)?;
        Ok(Box::new(FileChannel {
            path,
            file,
            append: !self.overwrite,
        }))
    }
}

impl Channel for FileChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, RouteError> {
        if !self.append {
            // reads may have moved the position; writes belong at the end
            self.file.seek(SeekFrom::End(0))?;
        }
        self.file.write_all(bytes)?;
        self.file.flush()?;
        Ok(bytes.len())
    }

    fn twrite(&mut self, tab: &Table) -> Result<(), RouteError> {
        let text = tab.out_table('\t', true, true);
        self.write(text.as_bytes())?;
        Ok(())
    }

    fn tell(&mut self) -> Result<Tell, RouteError> {
        let meta = std::fs::metadata(&self.path)?;
        let mtime = meta
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        Ok(Tell {
            seq: -1,
            size: meta.len() as i64,
            mtime,
        })
    }

    fn read(&mut self, _seq: i64, offset: i64) -> Result<Vec<Vec<u8>>, RouteError> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(offset.max(0) as u64))?;
        self.file.read_to_end(&mut buf)?;
        Ok(vec![buf])
    }

    fn tread(&mut self, seq: i64, offset: i64) -> Result<Table, RouteError> {
        let buffers = self.read(seq, offset)?;
        let text = String::from_utf8_lossy(&buffers.concat()).into_owned();
        crate::driver::scan_stream_table(&text)
    }
}
