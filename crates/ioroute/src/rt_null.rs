//! The null sink driver: accepts everything, keeps nothing.

use crate::driver::{Access, Channel, Driver, OpenRequest, Tell};
use crate::error::RouteError;
use tabular::Table;

/// Route driver swallowing all writes (`none:`).
pub struct NullDriver;

struct NullChannel;

impl Driver for NullDriver {
    fn prefix(&self) -> &'static str {
        "none"
    }

    fn description(&self) -> &'static str {
        "null sink"
    }

    fn access(&self, _suffix: &str, _mode: Access) -> bool {
        true
    }

    fn open(&self, _req: &OpenRequest<'_>) -> Result<Box<dyn Channel>, RouteError> {
        Ok(Box::new(NullChannel))
    }
}

impl Channel for NullChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, RouteError> {
        Ok(bytes.len())
    }

    fn twrite(&mut self, _tab: &Table) -> Result<(), RouteError> {
        Ok(())
    }

    fn tell(&mut self) -> Result<Tell, RouteError> {
        Ok(Tell::NONE)
    }

    fn read(&mut self, _seq: i64, _offset: i64) -> Result<Vec<Vec<u8>>, RouteError> {
        Ok(Vec::new())
    }

    fn tread(&mut self, _seq: i64, _offset: i64) -> Result<Table, RouteError> {
        Ok(Table::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_swallows() {
        let mut ch = NullChannel;
        assert_eq!(ch.write(b"gone").unwrap(), 4);
        assert!(ch.read(0, 0).unwrap().is_empty());
        assert_eq!(ch.tell().unwrap(), Tell::NONE);
    }
}
