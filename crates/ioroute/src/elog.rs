//! Severity-routed event logging over routes.
//!
//! Seven levels from `NoLog` to `Fatal`; each can point at its own
//! route with its own format string, and bulk setters address all
//! levels, a level and above, or a level and below. Formats use `%`
//! tokens substituted per event. Library code reports errors upward;
//! what reaches the log, and whether `Fatal` ends the process, is the
//! binary's decision at the top level.

use crate::error::RouteError;
use crate::route::{Route, Router};

/// Event severities, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum Severity {
    /// Suppression level; events at this level are never emitted.
    NoLog = 0,
    Debug = 1,
    Diag = 2,
    Info = 3,
    Warning = 4,
    Error = 5,
    Fatal = 6,
}

/// Number of severity levels, `NoLog` included.
pub const NSEVERITIES: usize = 7;

impl Severity {
    /// All levels in ascending order.
    pub const ALL: [Severity; NSEVERITIES] = [
        Severity::NoLog,
        Severity::Debug,
        Severity::Diag,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    /// The level's name.
    pub fn name(self) -> &'static str {
        match self {
            Severity::NoLog => "nolog",
            Severity::Debug => "debug",
            Severity::Diag => "diag",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// The level's single-letter code.
    pub fn letter(self) -> char {
        match self {
            Severity::NoLog => 'N',
            Severity::Debug => 'D',
            Severity::Diag => 'G',
            Severity::Info => 'I',
            Severity::Warning => 'W',
            Severity::Error => 'E',
            Severity::Fatal => 'F',
        }
    }

    /// Parses a single-letter code.
    pub fn from_letter(letter: char) -> Option<Self> {
        Severity::ALL
            .into_iter()
            .find(|s| s.letter() == letter.to_ascii_uppercase())
    }

    /// Parses a level name.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Severity::ALL.into_iter().find(|s| s.name() == lower)
    }
}

/// Everything known about one event at the capture site. The
/// [`elog!`](crate::elog!) macro fills the source fields in.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    /// Source file of the emission.
    pub file: &'a str,
    /// Source line of the emission.
    pub line: u32,
    /// Enclosing module or function path.
    pub function: &'a str,
    /// Numeric code carried with the event.
    pub code: i32,
    /// The message itself.
    pub message: &'a str,
}

/// Stock format: severity, message, capture site.
pub const FORMAT_STANDARD: &str = "%s %m (%F:%f:%L)";
/// Stock format: letter and message only.
pub const FORMAT_TERSE: &str = "%c: %m";
/// Stock format: everything, field per token.
pub const FORMAT_FULL: &str = "%d %t %s %c %p %P %i %I %F %L %f %o %e %m";

/// The severity-routed event log.
pub struct EventLog {
    routes: [Option<Route>; NSEVERITIES],
    formats: [String; NSEVERITIES],
    origin: String,
    short_name: String,
    long_name: String,
}

impl EventLog {
    /// A log with no destinations; set routes before emitting.
    pub fn new(short_name: &str, long_name: &str) -> Self {
        Self {
            routes: std::array::from_fn(|_| None),
            formats: std::array::from_fn(|_| FORMAT_STANDARD.to_string()),
            origin: String::new(),
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
        }
    }

    /// Sets the origin tag substituted for `%o`.
    pub fn set_origin(&mut self, origin: &str) {
        self.origin = origin.to_string();
    }

    /// Routes one severity; `None` silences it.
    pub fn set_route(&mut self, sev: Severity, route: Option<Route>) {
        self.routes[sev as usize] = route;
    }

    /// Opens `purl` for every level above `NoLog`.
    pub fn set_all(&mut self, router: &Router, purl: &str) -> Result<(), RouteError> {
        for sev in Severity::ALL {
            if sev != Severity::NoLog {
                self.routes[sev as usize] = Some(router.open(purl, "", None, 1)?);
            }
        }
        Ok(())
    }

    /// Opens `purl` for `sev` and everything more severe.
    pub fn set_above(
        &mut self,
        router: &Router,
        sev: Severity,
        purl: &str,
    ) -> Result<(), RouteError> {
        for level in Severity::ALL {
            if level >= sev && level != Severity::NoLog {
                self.routes[level as usize] = Some(router.open(purl, "", None, 1)?);
            }
        }
        Ok(())
    }

    /// Opens `purl` for `sev` and everything less severe.
    pub fn set_below(
        &mut self,
        router: &Router,
        sev: Severity,
        purl: &str,
    ) -> Result<(), RouteError> {
        for level in Severity::ALL {
            if level <= sev && level != Severity::NoLog {
                self.routes[level as usize] = Some(router.open(purl, "", None, 1)?);
            }
        }
        Ok(())
    }

    /// Sets the format for one severity.
    pub fn set_format(&mut self, sev: Severity, format: &str) {
        self.formats[sev as usize] = format.to_string();
    }

    /// Sets the format for every severity.
    pub fn set_all_formats(&mut self, format: &str) {
        for f in &mut self.formats {
            *f = format.to_string();
        }
    }

    /// Emits one event. Events at `NoLog`, or at a level with no
    /// route, are dropped.
    pub fn log(&mut self, sev: Severity, record: &EventRecord<'_>) -> Result<(), RouteError> {
        if sev == Severity::NoLog {
            return Ok(());
        }
        let line = self.render(sev, record);
        let Some(route) = self.routes[sev as usize].as_mut() else {
            return Ok(());
        };
        route.print(&line);
        route.print("\n");
        route.flush()
    }

    /// Expands the level's format for one event.
    ///
    /// Tokens: `%d` date-time, `%t` epoch seconds, `%s`/`%c` severity
    /// name/letter, `%p`/`%P` short/long program name, `%i`/`%I`
    /// process/thread id, `%F`/`%L`/`%f` file/line/function, `%o`
    /// origin, `%e` code, `%m` message, `%%` a literal percent.
    fn render(&self, sev: Severity, record: &EventRecord<'_>) -> String {
        let format = &self.formats[sev as usize];
        let now = chrono::Local::now();
        let mut out = String::with_capacity(format.len() + record.message.len());
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('d') => out.push_str(&now.format("%Y-%m-%d %H:%M:%S").to_string()),
                Some('t') => out.push_str(&now.timestamp().to_string()),
                Some('s') => out.push_str(sev.name()),
                Some('c') => out.push(sev.letter()),
                Some('p') => out.push_str(&self.short_name),
                Some('P') => out.push_str(&self.long_name),
                Some('i') => out.push_str(&std::process::id().to_string()),
                Some('I') => out.push_str(&thread_id()),
                Some('F') => out.push_str(record.file),
                Some('L') => out.push_str(&record.line.to_string()),
                Some('f') => out.push_str(record.function),
                Some('o') => out.push_str(&self.origin),
                Some('e') => out.push_str(&record.code.to_string()),
                Some('m') => out.push_str(record.message),
                Some('%') => out.push('%'),
                Some(other) => {
                    // unknown tokens pass through untouched
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            }
        }
        out
    }

    /// The reentrant form: a fixed-shape line straight to the standard
    /// error fd, no allocation, usable from signal handlers.
    pub fn safe_write(&self, sev: Severity, message: &str) {
        let letter = [sev.letter() as u8, b':', b' '];
        raw_stderr(&letter);
        raw_stderr(message.as_bytes());
        raw_stderr(b"\n");
    }

    /// Flushes every routed destination.
    pub fn flush_all(&mut self) {
        for route in self.routes.iter_mut().flatten() {
            let _ = route.flush();
        }
    }

    /// Closes all destinations, draining what they hold.
    pub fn close(mut self) {
        for route in self.routes.iter_mut().filter_map(Option::take) {
            let _ = route.close();
        }
    }
}

fn raw_stderr(bytes: &[u8]) {
    // best effort: a failed diagnostic write has nowhere to report to
    unsafe {
        libc::write(2, bytes.as_ptr().cast(), bytes.len());
    }
}

fn thread_id() -> String {
    // ThreadId has no numeric accessor; its Debug form carries one
    let raw = format!("{:?}", std::thread::current().id());
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Captures file, line and module and emits through an [`EventLog`].
///
/// ```no_run
/// # use ioroute::{elog, EventLog, Severity};
/// # let mut log = EventLog::new("probe", "telemetry probe");
/// elog!(log, Severity::Warning, "ring {} is {}% full", "r.cpu60", 95);
/// ```
#[macro_export]
macro_rules! elog {
    ($log:expr, $sev:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $log.log(
            $sev,
            &$crate::EventRecord {
                file: file!(),
                line: line!(),
                function: module_path!(),
                code: 0,
                message: &message,
            },
        )
    }};
}
