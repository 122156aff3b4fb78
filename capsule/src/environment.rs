//! Injected environment.
//!
//! Time is a dependency like any other: the service and the reminder
//! dispatcher read it through [`Clock`] so tests can pin it.

use chrono::{DateTime, Utc};

/// Clock abstraction for testable time.
///
/// # Examples
///
/// ```
/// use time_capsule::{Clock, SystemClock};
///
/// let before = chrono::Utc::now();
/// assert!(SystemClock.now() >= before);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
