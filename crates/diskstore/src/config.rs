//! Store configuration.

use std::time::Duration;

/// Tunables for opening and locking a store file.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Attempts to take the advisory lock before giving up.
    pub lock_attempts: u32,
    /// Fixed pause between lock attempts.
    pub lock_backoff: Duration,
    /// Unix permission mode used when creating the file.
    pub mode: u32,
}

impl StoreConfig {
    /// Creates a configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if `lock_attempts` is 0.
    pub const fn new(lock_attempts: u32, lock_backoff: Duration, mode: u32) -> Self {
        assert!(lock_attempts > 0, "lock_attempts must be at least 1");
        Self {
            lock_attempts,
            lock_backoff,
            mode,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_attempts: 50,
            lock_backoff: Duration::from_nanos(250_000),
            mode: 0o644,
        }
    }
}
