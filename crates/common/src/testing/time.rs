//! Controllable clock for expiry tests
//!
//! ```
//! use std::time::Duration;
//!
//! use authkeep_common::testing::MockClock;
//! use authkeep_common::time::Clock;
//!
//! let clock = MockClock::new();
//! let start = clock.millis_since_epoch();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch() - start, 5_000);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::time::Clock;

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the code under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Frozen at the current real time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    /// Frozen at `millis` since the UNIX epoch
    #[must_use]
    pub fn at_millis(millis: i64) -> Self {
        Self::at(Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now))
    }

    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_all_clones() {
        let clock = MockClock::at_millis(1_700_000_000_000);
        let shared = clock.clone();

        clock.advance(Duration::from_millis(1_500));

        assert_eq!(shared.millis_since_epoch(), 1_700_000_001_500);
    }

    #[test]
    fn clock_is_frozen_without_advance() {
        let clock = MockClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), first);
    }
}
