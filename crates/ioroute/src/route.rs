//! The router: pseudo-URL parsing, the driver registry and open routes.
//!
//! A route bundles the opened channel with an unsent byte buffer; all
//! writes accumulate until `flush`, `twrite` or `close`. A failed
//! explicit flush keeps the buffer for retry; `close` drains what it
//! can and discards the rest, reporting the loss.

use crate::driver::{Access, Channel, Driver, OpenRequest, Tell};
use crate::error::RouteError;
use crate::rt_file::FileDriver;
use crate::rt_null::NullDriver;
use crate::rt_ring::RingDriver;
use crate::rt_std::{StderrDriver, StdinDriver, StdoutDriver};
use std::ffi::CStr;
use tabular::{OrdMap, Table};

/// Router-wide settings fed to drivers and template expansion.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Directory substituted for `%v` in templated pseudo-URLs.
    pub var_dir: String,
    /// Job name substituted for `%j` in templated pseudo-URLs.
    pub jobname: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            var_dir: "var".to_string(),
            jobname: String::new(),
        }
    }
}

/// The driver registry and open entry point.
pub struct Router {
    drivers: OrdMap<String, Box<dyn Driver>>,
    config: RouterConfig,
}

impl Router {
    /// An empty router; register drivers before opening.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            drivers: OrdMap::new(),
            config,
        }
    }

    /// A router with the core drivers registered: `stdin`, `stdout`,
    /// `stderr`, `file` (append), `fileov` (overwrite), `none` and
    /// `ring`.
    pub fn with_core_drivers(config: RouterConfig) -> Self {
        let mut router = Self::new(config);
        router.register(Box::new(StdinDriver));
        router.register(Box::new(StdoutDriver));
        router.register(Box::new(StderrDriver));
        router.register(Box::new(FileDriver::append()));
        router.register(Box::new(FileDriver::overwrite()));
        router.register(Box::new(NullDriver));
        router.register(Box::new(RingDriver::default()));
        router
    }

    /// Registers a driver, replacing any holder of the same prefix.
    pub fn register(&mut self, mut driver: Box<dyn Driver>) {
        driver.init(&self.config);
        self.drivers.insert(driver.prefix().to_string(), driver);
    }

    /// Removes a driver. Returns false when the prefix was free.
    pub fn unregister(&mut self, prefix: &str) -> bool {
        match self.drivers.remove(&prefix.to_string()) {
            Some(mut driver) => {
                driver.fini();
                true
            }
            None => false,
        }
    }

    /// (prefix, description) of every registered driver, in prefix
    /// order.
    pub fn registered(&self) -> Vec<(String, String)> {
        self.drivers
            .iter()
            .map(|(p, d)| (p.clone(), d.description().to_string()))
            .collect()
    }

    /// Splits a pseudo-URL into prefix and suffix. An address without a
    /// colon is taken as `file:`.
    fn split(url: &str) -> (&str, &str) {
        match url.split_once(':') {
            Some((prefix, suffix)) => (prefix, suffix),
            None => ("file", url),
        }
    }

    fn driver(&self, url: &str) -> Result<(&dyn Driver, String), RouteError> {
        let (prefix, suffix) = Self::split(url);
        self.drivers
            .get(&prefix.to_string())
            .map(|d| (d.as_ref(), suffix.to_string()))
            .ok_or_else(|| RouteError::UnknownDriver(url.to_string()))
    }

    /// Probes whether the location behind `url` is accessible.
    pub fn access(&self, url: &str, mode: Access) -> bool {
        match self.driver(url) {
            Ok((driver, suffix)) => driver.access(&suffix, mode),
            Err(_) => false,
        }
    }

    /// Opens a route. `keep` of 0 means existing locations only.
    pub fn open(
        &self,
        url: &str,
        comment: &str,
        password: Option<&str>,
        keep: u32,
    ) -> Result<Route, RouteError> {
        let (driver, suffix) = self.driver(url)?;
        let req = OpenRequest {
            url,
            suffix: &suffix,
            comment,
            password,
            keep,
        };
        let channel = driver.open(&req)?;
        Ok(Route {
            url: url.to_string(),
            channel,
            pending: Vec::new(),
        })
    }

    /// Expands `%` tokens then opens: `%j` the configured jobname, `%h`
    /// host, `%m` domain, `%f` fqdn, `%d` duration, `%v` the var
    /// directory.
    pub fn open_t(
        &self,
        url: &str,
        comment: &str,
        password: Option<&str>,
        keep: u32,
        duration: u32,
    ) -> Result<Route, RouteError> {
        let expanded = self.expand(url, duration)?;
        self.open(&expanded, comment, password, keep)
    }

    /// Token expansion used by [`open_t`](Self::open_t).
    pub fn expand(&self, url: &str, duration: u32) -> Result<String, RouteError> {
        let mut out = String::with_capacity(url.len());
        let mut chars = url.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('j') => out.push_str(&self.config.jobname),
                Some('h') => out.push_str(&hostname_short()),
                Some('m') => out.push_str(&domainname()),
                Some('f') => out.push_str(&hostname_full()),
                Some('d') => out.push_str(&duration.to_string()),
                Some('v') => out.push_str(&self.config.var_dir),
                Some('%') => out.push('%'),
                Some(other) => return Err(RouteError::BadToken(other)),
                None => return Err(RouteError::BadToken('%')),
            }
        }
        Ok(out)
    }

    /// Opens a source, reads its latest message and closes it: the
    /// whole file for file channels, the youngest sample for rings.
    pub fn read(&self, url: &str, password: Option<&str>) -> Result<Vec<u8>, RouteError> {
        let mut route = self.open(url, "", password, 0)?;
        let tell = route.tell()?;
        let buffers = route.channel.read(tell.seq, 0)?;
        route.close()?;
        Ok(buffers.concat())
    }

    /// As [`read`](Self::read), materialized as a table.
    pub fn tread(&self, url: &str, password: Option<&str>) -> Result<Table, RouteError> {
        let mut route = self.open(url, "", password, 0)?;
        let tell = route.tell()?;
        let tab = route.channel.tread(tell.seq, 0)?;
        route.close()?;
        Ok(tab)
    }
}

/// One open channel plus its unsent buffer.
pub struct Route {
    url: String,
    channel: Box<dyn Channel>,
    pending: Vec<u8>,
}

impl Route {
    /// The pseudo-URL this route was opened from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queues bytes for sending; [`flush`](Self::flush) or close
    /// completes the write. Returns the number queued.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.pending.extend_from_slice(bytes);
        bytes.len()
    }

    /// Queues text for sending.
    pub fn print(&mut self, text: &str) -> usize {
        self.write(text.as_bytes())
    }

    /// Bytes queued but not yet sent.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Drops the pending buffer without sending it.
    pub fn kill_buffer(&mut self) {
        self.pending.clear();
    }

    /// Drains the pending buffer to the driver. On failure the buffer
    /// is kept so the caller may retry.
    pub fn flush(&mut self) -> Result<(), RouteError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        match self.channel.write(&self.pending) {
            Ok(n) if n == self.pending.len() => {
                self.pending.clear();
                Ok(())
            }
            Ok(n) => {
                // partial write: keep the unsent tail
                self.pending.drain(..n);
                Err(RouteError::FlushFailed {
                    url: self.url.clone(),
                    kept: self.pending.len(),
                })
            }
            Err(_) => Err(RouteError::FlushFailed {
                url: self.url.clone(),
                kept: self.pending.len(),
            }),
        }
    }

    /// Flushes, then writes the table through the driver's native
    /// table path.
    pub fn twrite(&mut self, tab: &Table) -> Result<(), RouteError> {
        self.flush()?;
        self.channel.twrite(tab)
    }

    /// See [`Channel::tell`].
    pub fn tell(&mut self) -> Result<Tell, RouteError> {
        self.channel.tell()
    }

    /// See [`Channel::read`].
    pub fn read(&mut self, seq: i64, offset: i64) -> Result<Vec<Vec<u8>>, RouteError> {
        self.channel.read(seq, offset)
    }

    /// See [`Channel::tread`].
    pub fn tread(&mut self, seq: i64, offset: i64) -> Result<Table, RouteError> {
        self.channel.tread(seq, offset)
    }

    /// Flushes and closes. Unsendable bytes are discarded; the error
    /// reports how many were lost.
    pub fn close(mut self) -> Result<(), RouteError> {
        let result = self.flush();
        if result.is_err() {
            self.pending.clear();
        }
        result
    }
}

// ---------------------------------------------------------------------
// HOST IDENTITY (for %h, %m, %f)
// ---------------------------------------------------------------------

fn uname_node() -> String {
    let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut buf) } != 0 {
        return String::new();
    }
    unsafe { CStr::from_ptr(buf.nodename.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn hostname_full() -> String {
    uname_node()
}

fn hostname_short() -> String {
    let full = uname_node();
    full.split('.').next().unwrap_or("").to_string()
}

fn domainname() -> String {
    let full = uname_node();
    match full.split_once('.') {
        Some((_, domain)) => domain.to_string(),
        None => String::new(),
    }
}
