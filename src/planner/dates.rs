//! Inclusive trip date arithmetic.
//!
//! An N-day trip starting on `start` ends on `start + (N - 1)` days: both the
//! first and the last day count toward the duration.

use chrono::{Days, NaiveDate};

/// Date format used throughout the planner.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Last day of a `duration_days` trip beginning on `start`.
pub fn end_date(start: NaiveDate, duration_days: u32) -> Option<NaiveDate> {
    let offset = duration_days.checked_sub(1)?;
    start.checked_add_days(Days::new(u64::from(offset)))
}

/// First day of a `duration_days` trip ending on `end`.
pub fn start_date(end: NaiveDate, duration_days: u32) -> Option<NaiveDate> {
    let offset = duration_days.checked_sub(1)?;
    end.checked_sub_days(Days::new(u64::from(offset)))
}

/// Number of days between `start` and `end`, counting both.
pub fn inclusive_duration(start: NaiveDate, end: NaiveDate) -> Option<u32> {
    let days = (end - start).num_days() + 1;
    u32::try_from(days).ok().filter(|d| *d >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn five_day_trip_ends_four_days_later() {
        assert_eq!(end_date(date(2024, 6, 1), 5), Some(date(2024, 6, 5)));
    }

    #[test]
    fn single_day_trip_ends_same_day() {
        assert_eq!(end_date(date(2024, 6, 1), 1), Some(date(2024, 6, 1)));
    }

    #[test]
    fn zero_days_has_no_end() {
        assert_eq!(end_date(date(2024, 6, 1), 0), None);
        assert_eq!(start_date(date(2024, 6, 1), 0), None);
    }

    #[test]
    fn spans_month_and_leap_day() {
        assert_eq!(end_date(date(2024, 2, 27), 4), Some(date(2024, 3, 1)));
        assert_eq!(start_date(date(2024, 3, 1), 4), Some(date(2024, 2, 27)));
    }

    #[test]
    fn end_before_start_has_no_duration() {
        assert_eq!(inclusive_duration(date(2024, 6, 5), date(2024, 6, 1)), None);
    }

    #[test]
    fn duration_round_trips_through_end_date() {
        let starts = [
            date(2024, 1, 1),
            date(2024, 2, 28),
            date(2023, 12, 31),
            date(2025, 6, 15),
        ];
        for start in starts {
            for n in 1..=60 {
                let end = end_date(start, n).unwrap();
                assert_eq!(inclusive_duration(start, end), Some(n), "start={start} n={n}");
                assert_eq!(start_date(end, n), Some(start));
            }
        }
    }

    #[test]
    fn parse_accepts_iso_dates_only() {
        assert_eq!(parse_date(" 2024-06-01 "), Some(date(2024, 6, 1)));
        assert_eq!(parse_date("June 1st"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }
}
