//! Ioroute - pseudo-URL addressed I/O channels and the event log
//!
//! One uniform open/write/read/tell/close surface over pluggable
//! drivers keyed by pseudo-URL prefix: the standard streams, appending
//! and overwriting files, ring-store rings and a null sink ship with
//! the crate; foreign drivers register alongside them. Writes buffer in
//! the route until flushed. On top sits [`EventLog`]: severity-routed
//! logging where every level picks its own destination and format.
//!
//! # Example
//!
//! ```no_run
//! use ioroute::{elog, EventLog, Router, RouterConfig, Severity};
//!
//! let router = Router::with_core_drivers(RouterConfig::default());
//!
//! let mut out = router.open("file:probe.log", "", None, 1)?;
//! out.print("probe started\n");
//! out.flush()?;
//!
//! let mut log = EventLog::new("probe", "telemetry probe");
//! log.set_above(&router, Severity::Warning, "stderr:")?;
//! elog!(log, Severity::Warning, "ring nearly full")?;
//! # Ok::<(), ioroute::RouteError>(())
//! ```

mod driver;
mod elog;
mod error;
mod route;
mod rt_file;
mod rt_null;
mod rt_ring;
mod rt_std;

pub use driver::{Access, Channel, Driver, OpenRequest, Tell};
pub use elog::{
    EventLog, EventRecord, Severity, FORMAT_FULL, FORMAT_STANDARD, FORMAT_TERSE, NSEVERITIES,
};
pub use error::RouteError;
pub use route::{Route, Router, RouterConfig};
pub use rt_file::FileDriver;
pub use rt_null::NullDriver;
pub use rt_ring::RingDriver;
pub use rt_std::{StderrDriver, StdinDriver, StdoutDriver};
