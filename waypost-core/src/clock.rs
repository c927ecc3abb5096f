//! Injectable source of "now".
//!
//! Freshness features depend on the current time. Extraction takes the time
//! from a [`Clock`] so tests can pin it with [`FixedClock`].

use chrono::{DateTime, Utc};

/// Supplies the current instant.
///
/// Implementations must be thread-safe so a single clock can be shared by
/// concurrent scoring calls.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use waypost_core::{Clock, FixedClock};
///
/// let instant = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
/// let clock = FixedClock::new(instant);
/// assert_eq!(clock.now(), instant);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Freeze time at `instant`.
    #[must_use]
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
