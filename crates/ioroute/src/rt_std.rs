//! Drivers for the standard streams.

use crate::driver::{Access, Channel, Driver, OpenRequest, Tell};
use crate::error::RouteError;
use std::io::{Read, Write};
use tabular::Table;

/// Which stream a std channel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    In,
    Out,
    Err,
}

struct StdChannel {
    stream: Stream,
}

impl Channel for StdChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, RouteError> {
        match self.stream {
            Stream::In => Err(RouteError::Unsupported("stdin")),
            Stream::Out => {
                let mut out = std::io::stdout();
                out.write_all(bytes)?;
                out.flush()?;
                Ok(bytes.len())
            }
            Stream::Err => {
                let mut err = std::io::stderr();
                err.write_all(bytes)?;
                err.flush()?;
                Ok(bytes.len())
            }
        }
    }

    fn twrite(&mut self, tab: &Table) -> Result<(), RouteError> {
        let text = tab.out_table('\t', true, true);
        self.write(text.as_bytes())?;
        Ok(())
    }

    fn tell(&mut self) -> Result<Tell, RouteError> {
        Ok(Tell::NONE)
    }

    fn read(&mut self, _seq: i64, _offset: i64) -> Result<Vec<Vec<u8>>, RouteError> {
        match self.stream {
            Stream::In => {
                let mut buf = Vec::new();
                std::io::stdin().read_to_end(&mut buf)?;
                Ok(vec![buf])
            }
            _ => Err(RouteError::Unsupported("stdout/stderr")),
        }
    }

    fn tread(&mut self, seq: i64, offset: i64) -> Result<Table, RouteError> {
        let buffers = self.read(seq, offset)?;
        let text = String::from_utf8_lossy(&buffers.concat()).into_owned();
        crate::driver::scan_stream_table(&text)
    }
}

macro_rules! std_driver {
    ($name:ident, $prefix:literal, $descr:literal, $stream:expr) => {
        /// Route driver for one standard stream.
        pub struct $name;

        impl Driver for $name {
            fn prefix(&self) -> &'static str {
                $prefix
            }

            fn description(&self) -> &'static str {
                $descr
            }

            fn access(&self, _suffix: &str, mode: Access) -> bool {
                match $stream {
                    Stream::In => mode == Access::Read,
                    _ => mode == Access::Write,
                }
            }

            fn open(&self, _req: &OpenRequest<'_>) -> Result<Box<dyn Channel>, RouteError> {
                Ok(Box::new(StdChannel { stream: $stream }))
            }
        }
    };
}

std_driver!(StdinDriver, "stdin", "standard input", Stream::In);
std_driver!(StdoutDriver, "stdout", "standard output", Stream::Out);
std_driver!(StderrDriver, "stderr", "standard error", Stream::Err);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_directions() {
        assert!(StdinDriver.access("", Access::Read));
        assert!(!StdinDriver.access("", Access::Write));
        assert!(StdoutDriver.access("", Access::Write));
        assert!(!StdoutDriver.access("", Access::Read));
        assert!(StderrDriver.access("", Access::Write));
    }

    #[test]
    fn test_tell_is_all_sentinels() {
        let mut ch = StdChannel { stream: Stream::Out };
        assert_eq!(ch.tell().unwrap(), Tell::NONE);
    }

    #[test]
    fn test_stdin_write_unsupported() {
        let mut ch = StdChannel { stream: Stream::In };
        assert!(matches!(
            ch.write(b"x"),
            Err(RouteError::Unsupported(_))
        ));
    }
}
