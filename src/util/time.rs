//! Time sources for cache-entry aging.
//!
//! The artifacts cache never reads the wall clock directly; it asks a
//! shared `Clock` so tests can drive entry ages deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time in milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since some fixed origin.
    fn current_time_millis(&self) -> u64;
}

/// Wall-clock time source.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_time_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at the given time.
    pub fn starting_at(millis: u64) -> Self {
        ManualClock {
            millis: AtomicU64::new(millis),
        }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn current_time_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_at(1000);
        assert_eq!(clock.current_time_millis(), 1000);

        clock.advance(250);
        assert_eq!(clock.current_time_millis(), 1250);

        clock.set(5000);
        assert_eq!(clock.current_time_millis(), 5000);
    }

    #[test]
    fn test_system_clock_is_nonzero() {
        assert!(SystemClock.current_time_millis() > 0);
    }
}
