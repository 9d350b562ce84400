//! Month arithmetic and month-key formatting.
//!
//! # Invariants
//! - `YearMonth.month0` is zero-indexed (`0..=11`).
//! - `MonthKey` is always `YYYY-MM` with a 1-indexed, zero-padded month.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static MONTH_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-(0[1-9]|1[0-2])$").expect("valid month key regex"));

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month0: u32,
}

/// The month currently displayed by the calendar.
pub type CalendarView = YearMonth;

impl YearMonth {
    /// Returns `None` when `month0` is outside `0..=11`.
    pub fn new(year: i32, month0: u32) -> Option<Self> {
        (month0 < 12).then_some(Self { year, month0 })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month0: date.month0(),
        }
    }

    /// Parses a `YYYY-MM` month key.
    pub fn parse_key(value: &str) -> Option<Self> {
        let caps = MONTH_KEY_RE.captures(value.trim())?;
        let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
        let month1 = caps.get(2)?.as_str().parse::<u32>().ok()?;
        Self::new(year, month1 - 1)
    }

    pub fn year(self) -> i32 {
        self.year
    }

    /// Zero-indexed month.
    pub fn month0(self) -> u32 {
        self.month0
    }

    pub fn previous(self) -> Self {
        if self.month0 == 0 {
            Self {
                year: self.year - 1,
                month0: 11,
            }
        } else {
            Self {
                year: self.year,
                month0: self.month0 - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month0 == 11 {
            Self {
                year: self.year + 1,
                month0: 0,
            }
        } else {
            Self {
                year: self.year,
                month0: self.month0 + 1,
            }
        }
    }

    pub fn key(self) -> MonthKey {
        MonthKey(format!("{:04}-{:02}", self.year, self.month0 + 1))
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day()?.pred_opt()
    }

    /// Every date of this month in ascending order.
    pub fn days(self) -> Vec<NaiveDate> {
        match (self.first_day(), self.last_day()) {
            (Some(first), Some(last)) => first.iter_days().take_while(|d| *d <= last).collect(),
            _ => Vec::new(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month0() == self.month0
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month0 + 1)
    }
}

/// Key of per-month metadata (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(String);

impl MonthKey {
    /// Parses and re-formats a stored key; `None` when malformed.
    pub fn parse(value: &str) -> Option<Self> {
        YearMonth::parse_key(value).map(YearMonth::key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Month key for a `(year, zero-indexed month)` pair.
///
/// Months outside `0..=11` roll into the neighbouring years.
pub fn month_key(year: i32, month0: u32) -> MonthKey {
    let year = year + (month0 / 12) as i32;
    YearMonth {
        year,
        month0: month0 % 12,
    }
    .key()
}

#[cfg(test)]
mod tests {
    use super::{month_key, MonthKey, YearMonth};
    use chrono::NaiveDate;

    #[test]
    fn month_key_pads_one_indexed_month() {
        assert_eq!(month_key(2024, 0).as_str(), "2024-01");
        assert_eq!(month_key(2024, 11).as_str(), "2024-12");
    }

    #[test]
    fn previous_and_next_wrap_years() {
        let jan = YearMonth::new(2024, 0).unwrap();
        assert_eq!(jan.previous(), YearMonth::new(2023, 11).unwrap());
        assert_eq!(jan.previous().next(), jan);
    }

    #[test]
    fn days_cover_whole_month() {
        let feb_leap = YearMonth::new(2024, 1).unwrap();
        let days = feb_leap.days();
        assert_eq!(days.len(), 29);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(days[28], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        assert_eq!(YearMonth::new(2023, 11).unwrap().days().len(), 31);
    }

    #[test]
    fn parse_key_rejects_malformed_values() {
        assert_eq!(YearMonth::parse_key("2019-05"), YearMonth::new(2019, 4));
        assert!(YearMonth::parse_key("2019-13").is_none());
        assert!(YearMonth::parse_key("2019-5").is_none());
        assert!(MonthKey::parse("garbage").is_none());
    }

    #[test]
    fn ordering_is_chronological() {
        let floor = YearMonth::new(2019, 4).unwrap();
        assert!(YearMonth::new(2019, 3).unwrap() < floor);
        assert!(YearMonth::new(2018, 11).unwrap() < floor);
        assert!(YearMonth::new(2020, 0).unwrap() > floor);
    }
}
