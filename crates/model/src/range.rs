//! Inclusive calendar-day ranges

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors building a [`DateRange`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// Date string is not `YYYY-MM-DD`
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Start date falls after end date
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    /// Rolling window of zero days
    #[error("range must cover at least one day")]
    Empty,

    /// Range longer than the caller allows
    #[error("range of {days} days exceeds the {max}-day limit")]
    TooLong { days: u32, max: u32 },
}

/// Longest range accepted from callers (one leap year)
pub const MAX_RANGE_DAYS: u32 = 366;

/// Inclusive range of business-timezone calendar days
///
/// Ranges are cache keys: two overlapping ranges are different keys and are
/// never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, RangeError> {
        if start_date > end_date {
            return Err(RangeError::Inverted {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Parse a range from two ISO `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    /// Rolling window of `days` days ending on `today` (inclusive)
    pub fn rolling(today: NaiveDate, days: u32) -> Result<Self, RangeError> {
        if days == 0 {
            return Err(RangeError::Empty);
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        Self::new(start, today)
    }

    /// Reject a range covering more than `max_days` days
    pub fn limit(self, max_days: u32) -> Result<Self, RangeError> {
        let days = self.len_days();
        if days > max_days {
            return Err(RangeError::TooLong {
                days,
                max: max_days,
            });
        }
        Ok(self)
    }

    /// Whether `day` falls inside the range
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day <= self.end_date
    }

    /// Number of calendar days covered
    pub fn len_days(&self) -> u32 {
        u32::try_from((self.end_date - self.start_date).num_days() + 1).unwrap_or(u32::MAX)
    }

    /// Every calendar day in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| RangeError::InvalidDate(s.to_string()))
}
