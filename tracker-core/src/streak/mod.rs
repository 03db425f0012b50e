//! Streak Calculator
//!
//! Streaks count consecutive calendar days with at least one completion.
//! Arithmetic is strictly date-based: the learner's recorded local date,
//! never elapsed hours between timestamps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a completion affected the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First activity ever
    Started,
    /// Activity on the day after the previous one
    Continued,
    /// Activity already logged today
    SameDay,
    /// Gap of two or more days
    Reset,
    /// Today is before the last recorded day; never decrement
    ClockSkew,
}

/// Whole calendar days from `last` to `today` (negative if `today` is earlier)
pub fn gap_days(last: NaiveDate, today: NaiveDate) -> i64 {
    today.signed_duration_since(last).num_days()
}

/// Compute the streak after activity on `today`.
///
/// Returns the new streak value and the transition taken.
pub fn next_streak(last: Option<NaiveDate>, today: NaiveDate, current: u32) -> (u32, StreakChange) {
    let Some(last) = last else {
        return (1, StreakChange::Started);
    };

    match gap_days(last, today) {
        0 => (current, StreakChange::SameDay),
        1 => (current.saturating_add(1), StreakChange::Continued),
        gap if gap > 1 => (1, StreakChange::Reset),
        _ => (current, StreakChange::ClockSkew),
    }
}

/// Parse a caller-supplied local date (`YYYY-MM-DD`)
pub fn parse_local_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_local_date(s).unwrap()
    }

    #[test]
    fn test_first_activity_starts_at_one() {
        assert_eq!(next_streak(None, d("2024-05-10"), 0), (1, StreakChange::Started));
        // a stale counter with no date is still a fresh start
        assert_eq!(next_streak(None, d("2024-05-10"), 4), (1, StreakChange::Started));
    }

    #[test]
    fn test_same_day_is_unchanged() {
        let day = d("2024-05-10");
        assert_eq!(next_streak(Some(day), day, 3), (3, StreakChange::SameDay));
    }

    #[test]
    fn test_next_day_increments() {
        assert_eq!(
            next_streak(Some(d("2024-05-10")), d("2024-05-11"), 3),
            (4, StreakChange::Continued)
        );
    }

    #[test]
    fn test_gap_resets() {
        assert_eq!(
            next_streak(Some(d("2024-05-10")), d("2024-05-12"), 3),
            (1, StreakChange::Reset)
        );
        assert_eq!(
            next_streak(Some(d("2024-05-10")), d("2024-06-30"), 40),
            (1, StreakChange::Reset)
        );
    }

    #[test]
    fn test_backwards_date_never_decrements() {
        assert_eq!(
            next_streak(Some(d("2024-05-10")), d("2024-05-08"), 6),
            (6, StreakChange::ClockSkew)
        );
    }

    #[test]
    fn test_month_and_leap_boundaries() {
        assert_eq!(gap_days(d("2024-02-28"), d("2024-02-29")), 1);
        assert_eq!(gap_days(d("2024-02-29"), d("2024-03-01")), 1);
        assert_eq!(gap_days(d("2023-12-31"), d("2024-01-01")), 1);
    }

    #[test]
    fn test_parse_local_date_rejects_garbage() {
        assert!(parse_local_date("2024-13-01").is_err());
        assert!(parse_local_date("yesterday").is_err());
        assert_eq!(parse_local_date(" 2024-01-02 ").unwrap(), d("2024-01-02"));
    }
}
