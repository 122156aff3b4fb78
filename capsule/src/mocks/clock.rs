//! Pinned clock.

use crate::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Fixed clock for deterministic tests.
///
/// Returns the same instant until moved with [`FixedClock::set`] or
/// [`FixedClock::advance`]. Clones share the instant.
///
/// # Example
///
/// ```
/// use time_capsule::mocks::FixedClock;
/// use time_capsule::Clock;
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let clock = FixedClock::new(start);
/// assert_eq!(clock.now(), clock.now());
///
/// clock.advance(Duration::days(1));
/// assert!(clock.now() > start);
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    micros: Arc<AtomicI64>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            micros: Arc::new(AtomicI64::new(time.timestamp_micros())),
        }
    }

    /// Move the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        self.micros.store(time.timestamp_micros(), Ordering::SeqCst);
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
}
