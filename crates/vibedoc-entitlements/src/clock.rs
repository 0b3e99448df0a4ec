//! Clock Source
//!
//! Every window and calendar-day computation in the platform goes through
//! an injected clock so that daily resets and period expiry are decidable
//! in tests without waiting for midnight.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Midnight of the calendar day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

/// Whether two instants fall on the same calendar day
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 42, 9).unwrap();
        let midnight = start_of_day(now);

        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_calendar_day_boundary() {
        let late = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 1).unwrap();

        assert!(same_calendar_day(late, late));
        assert!(!same_calendar_day(late, early));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        clock.advance(Duration::days(1));

        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap());
    }
}
