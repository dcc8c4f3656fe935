//! Local-time handling
//!
//! This module is the single authority for time semantics in studytrack.
//! Attendance timestamps are persisted as text and have accumulated three
//! shapes over the life of the data: RFC3339 with an offset, naive
//! datetimes (written by an older deployment that stored UTC without a
//! marker), and bare dates. [`normalize`] folds all of them into one
//! canonical representation: a `DateTime<FixedOffset>` in the configured
//! campus timezone. Every other component routes timestamps through it
//! instead of re-implementing timezone logic.
//!
//! The module also owns the [`Clock`] trait so that "now" can be swapped
//! for a fixed instant in tests.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};

/// Sessions longer than this are treated as corrupt data, not marathons.
pub const MAX_SESSION_SECS: i64 = 18 * 3600;

/// Convert a stored timestamp into the campus timezone.
///
/// Accepted shapes, tried in order:
/// - RFC3339 / ISO-8601 with an offset (a trailing `Z` is fine)
/// - naive datetime (`2024-03-01T09:15:00` or `2024-03-01 09:15:00`),
///   assumed to be UTC per the storage contract
/// - bare date (`2024-03-01`), taken as local midnight
///
/// Anything else yields `None`. Callers must treat absence as "skip this
/// record", never as zero.
pub fn normalize(raw: &str, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            // Naive values were written by a server running on UTC.
            return Some(Utc.from_utc_datetime(&naive).with_timezone(&tz));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return tz.from_local_datetime(&midnight).single();
    }

    None
}

/// Elapsed hours between check-in and check-out, rounded to 2 decimals.
///
/// Values outside the open interval `(0, 18h)` are corrupt (clock skew,
/// doctored rows, sessions spanning days) and come back as 0 rather than
/// polluting the totals.
pub fn session_hours(
    check_in: DateTime<FixedOffset>,
    check_out: DateTime<FixedOffset>,
) -> f64 {
    let secs = (check_out - check_in).num_seconds();
    if secs <= 0 || secs >= MAX_SESSION_SECS {
        return 0.0;
    }
    round_hours(secs as f64 / 3600.0)
}

/// Round an hour total to 2 decimals.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Local midnight of the day containing `at`.
pub fn day_start(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    at.with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("midnight is always representable on a fixed offset")
}

/// Local midnight of the Monday of the week containing `at`.
pub fn week_start(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let start = day_start(at);
    start - Duration::days(start.weekday().num_days_from_monday() as i64)
}

/// Local midnight of the 1st of the month containing `at`.
pub fn month_start(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    day_start(at)
        .with_day(1)
        .expect("day 1 exists in every month")
}

/// Source of "now" in the campus timezone.
///
/// Injected into the lifecycle service, the aggregator and the scheduler so
/// tests can pin the clock.
pub trait Clock: Send + Sync {
    /// Current instant, expressed in the campus timezone.
    fn now(&self) -> DateTime<FixedOffset>;

    /// The campus timezone.
    fn tz(&self) -> FixedOffset;
}

/// Wall clock pinned to a fixed campus offset.
pub struct SystemClock {
    tz: FixedOffset,
}

impl SystemClock {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz)
    }

    fn tz(&self) -> FixedOffset {
        self.tz
    }
}

/// Test clock returning a preset instant.
pub struct ManualClock {
    now: DateTime<FixedOffset>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// Parse an RFC3339 instant; panics on bad input, so test-only.
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339).expect("valid RFC3339 timestamp");
        Self { now }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn tz(&self) -> FixedOffset {
        *self.now.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    #[test]
    fn normalize_zoned_string_reexpresses_in_local() {
        let dt = normalize("2024-03-01T09:00:00+00:00", ist()).unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn normalize_accepts_trailing_z() {
        let dt = normalize("2024-03-01T09:00:00Z", ist()).unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn normalize_naive_is_assumed_utc() {
        let dt = normalize("2024-03-01T09:00:00", ist()).unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);

        let spaced = normalize("2024-03-01 09:00:00", ist()).unwrap();
        assert_eq!(spaced, dt);
    }

    #[test]
    fn normalize_bare_date_is_local_midnight() {
        let dt = normalize("2024-03-01", ist()).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn normalize_garbage_is_none_not_error() {
        assert!(normalize("", ist()).is_none());
        assert!(normalize("yesterday-ish", ist()).is_none());
        assert!(normalize("2024-13-45T09:00:00Z", ist()).is_none());
    }

    #[test]
    fn session_hours_rounds_to_two_decimals() {
        let a = normalize("2024-03-01T09:00:00+05:30", ist()).unwrap();
        let b = normalize("2024-03-01T12:30:00+05:30", ist()).unwrap();
        assert_eq!(session_hours(a, b), 3.5);

        let c = normalize("2024-03-01T09:20:00+05:30", ist()).unwrap();
        assert_eq!(session_hours(a, c), 0.33);
    }

    #[test]
    fn session_hours_zeroes_outside_sanity_window() {
        let a = normalize("2024-03-01T09:00:00+05:30", ist()).unwrap();
        // 20 hours is past the ceiling
        let late = normalize("2024-03-02T05:00:00+05:30", ist()).unwrap();
        assert_eq!(session_hours(a, late), 0.0);
        // negative intervals are rejected too
        let before = normalize("2024-03-01T08:00:00+05:30", ist()).unwrap();
        assert_eq!(session_hours(a, before), 0.0);
        // zero-length sessions carry no credit
        assert_eq!(session_hours(a, a), 0.0);
    }

    #[test]
    fn week_starts_monday() {
        // 2024-03-06 is a Wednesday
        let wed = normalize("2024-03-06T15:00:00+05:30", ist()).unwrap();
        let start = week_start(wed);
        assert_eq!(start.weekday(), chrono::Weekday::Mon);
        assert_eq!(start.day(), 4);
        assert_eq!((start.hour(), start.minute()), (0, 0));
    }

    #[test]
    fn month_starts_on_the_first() {
        let dt = normalize("2024-03-06T15:00:00+05:30", ist()).unwrap();
        let start = month_start(dt);
        assert_eq!(start.day(), 1);
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn manual_clock_returns_preset_instant() {
        let clock = ManualClock::at("2024-03-06T15:00:00+05:30");
        assert_eq!(clock.now().hour(), 15);
        assert_eq!(clock.tz().local_minus_utc(), 5 * 3600 + 30 * 60);
    }
}
