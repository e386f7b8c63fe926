//! Time source used for expiry decisions.

use std::fmt;
use std::sync::Arc;

/// Supplies the current unix time in seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_unix(&self) -> i64;
}

/// Shareable clock handle.
pub type DynClock = Arc<dyn Clock>;

/// Wall clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Returns a shared handle to the wall clock.
pub fn system_clock() -> DynClock {
    Arc::new(SystemClock)
}

/// A clock that only moves when told to.
#[cfg(any(test, feature = "testutil"))]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "testutil"))]
impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(start),
        }
    }

    /// Starts at the current wall clock time.
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now_unix())
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now
            .fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "testutil"))]
impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_unix(), 100);
        clock.advance(25);
        assert_eq!(clock.now_unix(), 125);
        clock.set(7);
        assert_eq!(clock.now_unix(), 7);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_unix() > 1_577_836_800);
    }
}
