//! Injectable time source.
//!
//! The engine never reads the wall clock directly, so ticks can be driven
//! deterministically in tests and replays.

use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to `now`. Moving backwards is ignored.
    pub fn set(&self, now: OffsetDateTime) {
        let mut current = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if now > *current {
            *current = now;
        }
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut current = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_only_moves_forward() {
        let clock = ManualClock::new(datetime!(2025-02-09 13:00 UTC));
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), datetime!(2025-02-09 13:05 UTC));

        clock.set(datetime!(2025-02-09 12:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-02-09 13:05 UTC));

        clock.set(datetime!(2025-02-10 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-02-10 00:00 UTC));
    }

    #[test]
    fn system_clock_is_utc() {
        assert!(SystemClock.now().offset().is_utc());
    }
}
