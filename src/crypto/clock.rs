//! Injectable wall-clock source shared by the load monitor and the cookie
//! manager, so both of their second/bucket-boundary decisions can be driven
//! deterministically in tests rather than by sleeping across real time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as whole seconds since the unix epoch.
pub trait Clock: Send + Sync {
    /// Current unix time, in seconds.
    fn now_secs(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs()
    }
}

/// A clock set explicitly by the caller, for exercising second/bucket
/// boundaries in tests without a real sleep.
#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// A manual clock starting at the given unix-seconds value.
    pub(crate) fn new(start_secs: u64) -> Self {
        ManualClock(Arc::new(AtomicU64::new(start_secs)))
    }

    /// Set the clock to an explicit unix-seconds value.
    pub(crate) fn set(&self, secs: u64) {
        self.0.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
