//! Calendar-day handling for the daily document axis

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::fmt;

/// Wire format of the `from` / `to` request parameters
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// A single UTC calendar day, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Midnight at the start of the day (inclusive)
    pub start: DateTime<Utc>,
    /// Midnight at the start of the next day (exclusive)
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window covering the given calendar day
    pub fn for_day(day: NaiveDate) -> Self {
        let start = start_of_day(day);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Window covering the current UTC day
    pub fn today() -> Self {
        Self::for_day(Utc::now().date_naive())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Midnight UTC of a calendar day
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Parse a `YYYY-MM-DD` request parameter into midnight UTC.
///
/// Returns `None` for anything else; callers drop the bound instead of
/// reporting an error.
pub fn parse_day(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT)
        .ok()
        .map(start_of_day)
}

/// Parse a stored timestamp: RFC 3339 first, then a bare `YYYY-MM-DD`
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_day(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_accepts_only_calendar_dates() {
        let parsed = parse_day("2021-01-31").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2021-01-31T00:00:00+00:00");

        assert!(parse_day("2021-02-30").is_none());
        assert!(parse_day("31/01/2021").is_none());
        assert!(parse_day("yesterday").is_none());
        assert!(parse_day("").is_none());
    }

    #[test]
    fn test_day_window_is_half_open() {
        let day = NaiveDate::from_ymd_opt(2021, 3, 14).unwrap();
        let window = DayWindow::for_day(day);

        assert!(window.contains(start_of_day(day)));
        assert!(window.contains(start_of_day(day) + Duration::hours(23)));
        assert!(!window.contains(window.end));
        assert!(!window.contains(window.start - Duration::seconds(1)));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2021-01-05T10:30:00Z").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2021-01-05T10:30:00+00:00");

        let offset = parse_timestamp("2021-01-05T12:30:00+02:00").unwrap();
        assert_eq!(offset, rfc);

        let bare = parse_timestamp("2021-01-05").unwrap();
        assert_eq!(bare.to_rfc3339(), "2021-01-05T00:00:00+00:00");

        assert!(parse_timestamp("not a date").is_none());
    }
}
