//! Clock abstraction for deterministic time handling.
//!
//! Every component that reads the current time takes an injected
//! [`Clock`] so that token expiry and rate windows can be tested with a
//! fake clock instead of sleeping.

use std::sync::RwLock;
use std::time::Duration;

use time::OffsetDateTime;

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A manually driven clock for tests.
///
/// Starts at a fixed instant and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    #[must_use]
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock forward by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now += by;
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, to: OffsetDateTime) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(datetime!(2024-06-01 10:00:00 UTC));
        assert_eq!(clock.now(), datetime!(2024-06-01 10:00:00 UTC));

        clock.advance(Duration::from_secs(3600));
        assert_eq!(clock.now(), datetime!(2024-06-01 11:00:00 UTC));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(datetime!(2024-06-01 10:00:00 UTC));
        clock.set(datetime!(2025-01-01 00:00:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-01-01 00:00:00 UTC));
    }
}
