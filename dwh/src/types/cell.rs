use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{DwhResult, ErrorKind};

/// Accepted textual timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Accepted textual date layout.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single value read from, or written to, either database.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    /// Interprets the cell as a calendar date.
    ///
    /// Timestamps are truncated to their date and strings are parsed as `YYYY-MM-DD`,
    /// optionally followed by a time part.
    pub fn to_date(&self) -> DwhResult<Option<NaiveDate>> {
        match self {
            Cell::Null => Ok(None),
            Cell::Date(date) => Ok(Some(*date)),
            Cell::Timestamp(timestamp) => Ok(Some(timestamp.date())),
            Cell::String(value) if value.trim().is_empty() => Ok(None),
            Cell::String(value) => {
                let value = value.trim();
                if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
                    return Ok(Some(date));
                }

                Ok(Some(parse_timestamp(value)?.date()))
            }
            other => bail!(
                ErrorKind::ConversionError,
                "Value cannot be read as a date",
                format!("{other:?}")
            ),
        }
    }

    /// Interprets the cell as a timestamp; dates become midnight.
    pub fn to_timestamp(&self) -> DwhResult<Option<NaiveDateTime>> {
        match self {
            Cell::Null => Ok(None),
            Cell::Timestamp(timestamp) => Ok(Some(*timestamp)),
            Cell::Date(date) => Ok(Some(date.and_time(NaiveTime::MIN))),
            Cell::String(value) if value.trim().is_empty() => Ok(None),
            Cell::String(value) => {
                let value = value.trim();
                if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
                    return Ok(Some(date.and_time(NaiveTime::MIN)));
                }

                Ok(Some(parse_timestamp(value)?))
            }
            other => bail!(
                ErrorKind::ConversionError,
                "Value cannot be read as a timestamp",
                format!("{other:?}")
            ),
        }
    }

    /// Returns the numeric value of integer, float and decimal cells.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Cell::I16(value) => Some(BigDecimal::from(*value)),
            Cell::I32(value) => Some(BigDecimal::from(*value)),
            Cell::I64(value) => Some(BigDecimal::from(*value)),
            Cell::F64(value) if value.is_finite() => BigDecimal::from_str(&value.to_string()).ok(),
            Cell::Numeric(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Null-safe comparison with SQL `IS DISTINCT FROM` semantics.
    ///
    /// Two nulls are not distinct, a null and a value are. Numbers compare by value across
    /// integer, float and decimal representations so a change of storage type alone is
    /// never reported as a change. Other mixed representations compare by their text.
    pub fn is_distinct_from(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => false,
            (Cell::Null, _) | (_, Cell::Null) => true,
            (Cell::F64(a), Cell::F64(b)) => a != b,
            (a, b) => match (a.to_decimal(), b.to_decimal()) {
                (Some(a), Some(b)) => a != b,
                _ if std::mem::discriminant(a) == std::mem::discriminant(b) => a != b,
                _ => a.to_string() != b.to_string(),
            },
        }
    }
}

fn parse_timestamp(value: &str) -> DwhResult<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(timestamp);
        }
    }

    bail!(
        ErrorKind::ConversionError,
        "Text cannot be read as a timestamp",
        value
    )
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I16(value) => write!(f, "{value}"),
            Cell::I32(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::Numeric(value) => write!(f, "{value}"),
            Cell::String(value) => f.write_str(value),
            Cell::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Cell::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<BigDecimal> for Cell {
    fn from(value: BigDecimal) -> Self {
        Cell::Numeric(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
