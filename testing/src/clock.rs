//! A deterministic clock for reproducible event timestamps.

use chrono::{DateTime, Utc};

/// Something that can report the current time. [`InMemoryEventLog`](crate::log::InMemoryEventLog)
/// uses one to stamp appended events; tests swap in a [`FixedClock`] so
/// assertions don't race real wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time, per this clock.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock. [`InMemoryEventLog::new`](crate::log::InMemoryEventLog::new) uses this by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same time.
///
/// # Example
///
/// ```
/// use eventide_testing::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::new(chrono::Utc::now());
/// let time1 = clock.now();
/// let time2 = clock.now();
/// assert_eq!(time1, time2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A fixed clock reporting a stable default timestamp (2025-01-01 UTC),
/// for tests that don't care what time it is, only that it's the same one
/// every time.
///
/// # Panics
///
/// Never, in practice: the hardcoded timestamp is valid RFC 3339 and this
/// is covered by [`tests::test_clock_is_stable`].
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap_or_else(|_| Utc::now().into())
            .with_timezone(&Utc),
    )
}
