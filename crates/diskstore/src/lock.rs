//! Advisory file locking with a bounded retry budget.
//!
//! Shared locks permit read parallelism between processes; exclusive
//! locks serialize writers. Acquisition is non-blocking with a fixed
//! back-off between attempts, so a wedged peer surfaces as
//! `LockUnavailable` instead of a hang.

use crate::config::StoreConfig;
use crate::error::StoreError;
use std::fs::File;
use std::os::unix::io::AsRawFd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockKind {
    Shared,
    Exclusive,
}

/// Takes the advisory lock, retrying up to the configured budget.
pub(crate) fn lock(file: &File, kind: LockKind, config: &StoreConfig) -> Result<(), StoreError> {
    let op = match kind {
        LockKind::Shared => libc::LOCK_SH,
        LockKind::Exclusive => libc::LOCK_EX,
    } | libc::LOCK_NB;

    for attempt in 0..config.lock_attempts {
        let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::WouldBlock {
            return Err(StoreError::Io(err));
        }
        if attempt + 1 < config.lock_attempts {
            std::thread::sleep(config.lock_backoff);
        }
    }
    Err(StoreError::LockUnavailable {
        attempts: config.lock_attempts,
    })
}

/// Releases the advisory lock.
pub(crate) fn unlock(file: &File) {
    // failure to unlock is unreported; the fd close releases it anyway
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exclusive_excludes_second_handle() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let f1 = File::open(tmp.path()).unwrap();
        let f2 = File::open(tmp.path()).unwrap();
        let quick = StoreConfig::new(2, Duration::from_nanos(1000), 0o644);

        lock(&f1, LockKind::Exclusive, &quick).unwrap();
        let denied = lock(&f2, LockKind::Shared, &quick);
        assert!(matches!(
            denied,
            Err(StoreError::LockUnavailable { attempts: 2 })
        ));

        unlock(&f1);
        lock(&f2, LockKind::Shared, &quick).unwrap();
        unlock(&f2);
    }

    #[test]
    fn test_shared_locks_coexist() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let f1 = File::open(tmp.path()).unwrap();
        let f2 = File::open(tmp.path()).unwrap();
        let quick = StoreConfig::new(2, Duration::from_nanos(1000), 0o644);

        lock(&f1, LockKind::Shared, &quick).unwrap();
        lock(&f2, LockKind::Shared, &quick).unwrap();
        unlock(&f1);
        unlock(&f2);
    }
}
