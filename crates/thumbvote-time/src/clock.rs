//! Clock implementations
//!
//! All frame timestamps, hold timing and delayed tasks read the same clock,
//! so a hold measured by frames and a hold animated by the manual fallback
//! share one time base.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thumbvote_core::Timestamp;

/// Source of monotonic timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by the OS monotonic timer
/// INVARIANT: successive `now()` calls never go backwards
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is "now"
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }

    /// Time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.origin.elapsed())
    }
}

/// Manually driven clock for deterministic tests and replays
///
/// Clones share the same underlying time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    value: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(t: Timestamp) -> Self {
        ManualClock {
            value: Arc::new(Mutex::new(t)),
        }
    }

    /// Move the clock forward by `dt`
    pub fn advance(&self, dt: Duration) -> Timestamp {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }

    /// Jump to `t`; only forward moves are applied
    pub fn set(&self, t: Timestamp) {
        let mut value = self.value.lock();
        if t > *value {
            *value = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();

        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now(), Timestamp::from_millis(250));
    }

    #[test]
    fn test_manual_clock_never_goes_back() {
        let clock = ManualClock::starting_at(Timestamp::from_millis(100));

        clock.set(Timestamp::from_millis(50));
        assert_eq!(clock.now(), Timestamp::from_millis(100));

        clock.set(Timestamp::from_millis(300));
        assert_eq!(clock.now(), Timestamp::from_millis(300));
    }
}
