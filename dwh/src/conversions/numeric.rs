use bigdecimal::{BigDecimal, RoundingMode};
use std::str::FromStr;
use thiserror::Error;

use crate::types::Cell;

/// Text the extractors store for absent figures.
const ABSENT_FIGURES: &[&str] = &["", "none", "null", "nan", "-"];

/// Errors raised when a value cannot be stored as a fixed-precision decimal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalCastError {
    #[error("`{0}` is not a number")]
    NotNumeric(String),

    #[error("`{0}` is not a finite number")]
    NotFinite(String),

    #[error("`{value}` does not fit numeric({precision}, {scale})")]
    Overflow {
        value: String,
        precision: u32,
        scale: u32,
    },
}

/// Fixed precision and scale of a decimal column, like SQL `NUMERIC(p, s)`.
///
/// Measures are rounded to this representation before being stored so that replaying a
/// batch writes byte-identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedDecimal {
    pub precision: u32,
    pub scale: u32,
}

impl FixedDecimal {
    pub const fn new(precision: u32, scale: u32) -> Self {
        Self { precision, scale }
    }

    /// Rounds `value` half-up to the scale, failing when the integer part is too wide.
    pub fn round(&self, value: &BigDecimal) -> Result<BigDecimal, DecimalCastError> {
        let rounded = value.with_scale_round(i64::from(self.scale), RoundingMode::HalfUp);
        if rounded.digits() > u64::from(self.precision) {
            return Err(DecimalCastError::Overflow {
                value: value.to_string(),
                precision: self.precision,
                scale: self.scale,
            });
        }

        Ok(rounded)
    }

    /// Casts a cell to this decimal representation.
    ///
    /// Nulls stay null. Integers, floats, decimals and numeric text are accepted; the
    /// placeholders the extractors write for absent figures become null.
    pub fn cast(&self, cell: &Cell) -> Result<Cell, DecimalCastError> {
        let value = match cell {
            Cell::Null => return Ok(Cell::Null),
            Cell::I16(value) => BigDecimal::from(*value),
            Cell::I32(value) => BigDecimal::from(*value),
            Cell::I64(value) => BigDecimal::from(*value),
            Cell::F64(value) if !value.is_finite() => {
                return Err(DecimalCastError::NotFinite(value.to_string()));
            }
            Cell::F64(value) => parse_decimal(&value.to_string())?,
            Cell::Numeric(value) => value.clone(),
            Cell::String(text) => {
                if is_absent_figure(text) {
                    return Ok(Cell::Null);
                }
                parse_decimal(text.trim())?
            }
            other => return Err(DecimalCastError::NotNumeric(other.to_string())),
        };

        Ok(Cell::Numeric(self.round(&value)?))
    }
}

/// Parses decimal text, including scientific notation.
pub fn parse_decimal(text: &str) -> Result<BigDecimal, DecimalCastError> {
    BigDecimal::from_str(text).map_err(|_| DecimalCastError::NotNumeric(text.to_string()))
}

pub fn is_absent_figure(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    ABSENT_FIGURES.contains(&text.as_str())
}
