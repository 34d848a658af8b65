use crate::error::CoreError;
use chrono::{
    DateTime, Days, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coarse period selector, as offered to the user.
///
/// Windows are rolling: `ThisWeek` is "the last seven days", not "since Monday".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Today,
    #[serde(rename = "week", alias = "this-week")]
    ThisWeek,
    #[serde(rename = "month", alias = "this-month")]
    ThisMonth,
    #[default]
    #[serde(rename = "all", alias = "all-time")]
    AllTime,
}

impl Period {
    /// Resolves the period against the local wall clock.
    pub fn resolve(self) -> Option<TimeWindow> {
        self.resolve_at(Local::now().naive_local())
    }

    /// Resolves the period against a fixed local instant.
    ///
    /// Returns `None` for `AllTime`, meaning the ledger receives no date constraint.
    /// The end of every bounded window is the calendar date of `now`, inclusive.
    pub fn resolve_at(self, now: NaiveDateTime) -> Option<TimeWindow> {
        let today = now.date();
        let start = match self {
            Period::Today => today,
            Period::ThisWeek => today.checked_sub_days(Days::new(7)).unwrap_or(NaiveDate::MIN),
            // chrono clamps the day-of-month to the end of the shorter month (03-31 -> 02-29).
            Period::ThisMonth => today.checked_sub_months(Months::new(1)).unwrap_or(NaiveDate::MIN),
            Period::AllTime => return None,
        };
        Some(TimeWindow { start, end: today })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::ThisWeek => "week",
            Period::ThisMonth => "month",
            Period::AllTime => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Period::Today),
            "week" | "this-week" => Ok(Period::ThisWeek),
            "month" | "this-month" => Ok(Period::ThisMonth),
            "all" | "all-time" => Ok(Period::AllTime),
            other => Err(CoreError::InvalidInput("period".to_string(), other.to_string())),
        }
    }
}

/// An inclusive calendar-date range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The window as a half-open `[from, until)` range of instants, where the calendar
    /// dates are read in `tz`. `from` is the start date's midnight; `until` is the midnight
    /// after the end date.
    pub fn instant_bounds_in<Tz: TimeZone>(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let after_end = self.end.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        (start_of_day(self.start, tz), start_of_day(after_end, tz))
    }
}

/// The first instant of `date` in `tz`.
fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump: the day starts once the clocks have moved.
        .or_else(|| tz.from_local_datetime(&(midnight + TimeDelta::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// The `{ start, end }` pair reported back to callers; both absent for all-time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl From<Option<TimeWindow>> for PeriodBounds {
    fn from(window: Option<TimeWindow>) -> Self {
        match window {
            Some(w) => Self { start: Some(w.start), end: Some(w.end) },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_this_month_clamps_to_leap_day() {
        let window = Period::ThisMonth.resolve_at(at(2024, 3, 31)).unwrap();
        assert_eq!(window.start(), date(2024, 2, 29));
        assert_eq!(window.end(), date(2024, 3, 31));
    }

    #[test]
    fn test_this_month_clamps_in_non_leap_year() {
        let window = Period::ThisMonth.resolve_at(at(2023, 3, 31)).unwrap();
        assert_eq!(window.start(), date(2023, 2, 28));
    }

    #[test]
    fn test_this_week_is_rolling_seven_days() {
        // 2024-03-06 is a Wednesday; the window does not snap to Monday.
        let window = Period::ThisWeek.resolve_at(at(2024, 3, 6)).unwrap();
        assert_eq!(window.start(), date(2024, 2, 28));
        assert_eq!(window.end(), date(2024, 3, 6));
    }

    #[test]
    fn test_today_starts_and_ends_on_current_date() {
        let window = Period::Today.resolve_at(at(2024, 1, 1)).unwrap();
        assert_eq!(window.start(), window.end());
        assert_eq!(window.start(), date(2024, 1, 1));
    }

    #[test]
    fn test_all_time_has_no_bound() {
        assert!(Period::AllTime.resolve_at(at(2024, 3, 31)).is_none());
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        assert!(TimeWindow::new(date(2024, 3, 2), date(2024, 3, 1)).is_err());
        let window = TimeWindow::new(date(2024, 3, 1), date(2024, 3, 2)).unwrap();
        assert!(window.contains(date(2024, 3, 2)));
        assert!(!window.contains(date(2024, 3, 3)));
    }

    #[test]
    fn test_instant_bounds_follow_the_local_calendar() {
        let tokyo = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let window = Period::Today.resolve_at(at(2024, 3, 10)).unwrap();
        let (from, until) = window.instant_bounds_in(&tokyo);

        // Local midnight on 03-10 is 15:00 UTC on 03-09.
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap());

        let (from, until) = window.instant_bounds_in(&Utc);
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_accepts_long_and_short_names() {
        assert_eq!("this-month".parse::<Period>().unwrap(), Period::ThisMonth);
        assert_eq!("all".parse::<Period>().unwrap(), Period::AllTime);
        let parsed: Period = serde_json::from_str("\"this-week\"").unwrap();
        assert_eq!(parsed, Period::ThisWeek);
    }
}
