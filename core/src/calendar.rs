//! Calendar utility — canonical month names and month-granularity periods.
//!
//! All "before join date" comparisons go through [`YearMonth`]: a member
//! who joined on the 15th counts from the 1st of that month.

use crate::error::{BelError, BelResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The twelve canonical month names, in calendar order.
pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Exact, case-sensitive match against the canonical English names.
    pub fn from_name(name: &str) -> Option<Self> {
        month_index(name).map(|i| Self::ALL[i])
    }

    /// Month from its 1-based calendar number.
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1..=12 => Some(Self::ALL[(number - 1) as usize]),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[self.index()]
    }

    /// 0-based index (January = 0).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// 1-based calendar number (January = 1).
    pub fn number(&self) -> u32 {
        self.index() as u32 + 1
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a month name to its 0-based index, or None if it is not canonical.
pub fn month_index(name: &str) -> Option<usize> {
    MONTH_NAMES.iter().position(|m| *m == name)
}

/// First day of the given month.
pub fn month_start(year: i32, month: Month) -> BelResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.number(), 1).ok_or(BelError::InvalidPeriod {
        year,
        month: month.number(),
    })
}

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: Month,
}

impl YearMonth {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// Build from a 1-based month number, rejecting anything outside 1..=12.
    pub fn from_numbers(year: i32, month: u32) -> BelResult<Self> {
        Month::from_number(month)
            .map(|m| Self::new(year, m))
            .ok_or(BelError::InvalidPeriod { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Month::ALL[date.month0() as usize],
        }
    }

    pub fn start(&self) -> BelResult<NaiveDate> {
        month_start(self.year, self.month)
    }

    pub fn last_day(&self) -> BelResult<NaiveDate> {
        let next = self.succ()?.start()?;
        next.pred_opt().ok_or(self.invalid())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// The preceding month. Fails only at the edge of the `i32` year range.
    pub fn pred(&self) -> BelResult<Self> {
        match self.month {
            Month::January => self
                .year
                .checked_sub(1)
                .map(|y| Self::new(y, Month::December))
                .ok_or(self.invalid()),
            m => Ok(Self::new(self.year, Month::ALL[m.index() - 1])),
        }
    }

    /// The following month.
    pub fn succ(&self) -> BelResult<Self> {
        match self.month {
            Month::December => self
                .year
                .checked_add(1)
                .map(|y| Self::new(y, Month::January))
                .ok_or(self.invalid()),
            m => Ok(Self::new(self.year, Month::ALL[m.index() + 1])),
        }
    }

    fn invalid(&self) -> BelError {
        BelError::InvalidPeriod { year: self.year, month: self.month.number() }
    }

    /// Every month of `year`, January first.
    pub fn months_of(year: i32) -> impl Iterator<Item = YearMonth> {
        Month::ALL.into_iter().map(move |m| YearMonth::new(year, m))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month.number())
    }
}
