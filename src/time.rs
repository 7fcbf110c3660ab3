//! Wall-clock access behind a trait, so the receiver's idle-timeout and
//! resynchronisation logic can be driven deterministically in tests instead
//! of depending on real elapsed time.

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the wall-clock "now" the tunnel uses for idle-timeout detection
/// and for seeding the initial sequence number from wall-clock entropy.
pub trait TimeProvider: Send + Sync {
    /// Seconds since the UNIX epoch.
    fn now_unix_secs(&self) -> u64;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the UNIX epoch")
            .as_secs()
    }
}

/// A manually-advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualTimeProvider {
    now: RwLock<u64>,
}

impl ManualTimeProvider {
    pub fn new(now_unix_secs: u64) -> Self {
        Self {
            now: RwLock::new(now_unix_secs),
        }
    }

    pub fn set(&self, now_unix_secs: u64) {
        *self.now.write().unwrap() = now_unix_secs;
    }

    pub fn advance(&self, secs: u64) {
        *self.now.write().unwrap() += secs;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_unix_secs(&self) -> u64 {
        *self.now.read().unwrap()
    }
}
