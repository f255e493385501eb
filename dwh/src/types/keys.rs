use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Surrogate key of a company dimension version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompanyKey(pub i64);

impl fmt::Display for CompanyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate key of a calendar day in the date dimension, `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(pub i32);

impl DateKey {
    /// Key assigned to `date` when the date dimension is seeded.
    pub fn for_date(date: NaiveDate) -> DateKey {
        DateKey(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
