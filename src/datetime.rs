//! Date/time utilities for feedcast.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;

/// Source of the current time.
///
/// Components take a clock instead of calling `Utc::now()` so schedules and
/// message timestamps can be pinned in tests.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that returns a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock pinned at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Format a DateTime<Utc> in the given timezone.
pub fn format_in_timezone(dt: &DateTime<Utc>, tz: Tz, format: &str) -> String {
    dt.with_timezone(&tz).format(format).to_string()
}

/// Weekday of `dt` as observed in the given timezone.
pub fn weekday_in(dt: &DateTime<Utc>, tz: Tz) -> Weekday {
    dt.with_timezone(&tz).weekday()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_in_timezone() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let formatted = format_in_timezone(&dt, chrono_tz::Asia::Tokyo, "%Y/%m/%d %H:%M:%S");
        assert_eq!(formatted, "2024/01/15 19:30:00");
    }

    #[test]
    fn test_weekday_crosses_date_line() {
        // Saturday 20:00 UTC is already Sunday in Tokyo
        let dt = Utc.with_ymd_and_hms(2024, 1, 13, 20, 0, 0).unwrap();
        assert_eq!(weekday_in(&dt, chrono_tz::UTC), Weekday::Sat);
        assert_eq!(weekday_in(&dt, chrono_tz::Asia::Tokyo), Weekday::Sun);
    }

    #[test]
    fn test_fixed_clock_set() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
