use bigdecimal::ToPrimitive;

use crate::bail;
use crate::conversions::bool::parse_bool;
use crate::conversions::numeric::{is_absent_figure, parse_decimal};
use crate::error::{DwhResult, ErrorKind};
use crate::types::{Cell, ColumnType};

/// Converts `cell` to the representation stored in a column of type `typ`.
///
/// Nulls pass through unchanged. Integer targets reject values out of range or with a
/// fractional part, and textual placeholders for absent figures become null on numeric
/// targets.
pub fn coerce(cell: Cell, typ: &ColumnType) -> DwhResult<Cell> {
    if cell.is_null() {
        return Ok(Cell::Null);
    }

    if is_numeric_target(typ)
        && let Cell::String(text) = &cell
        && is_absent_figure(text)
    {
        return Ok(Cell::Null);
    }

    let coerced = match typ {
        ColumnType::Boolean => coerce_bool(cell)?,
        ColumnType::SmallInt => {
            let value = coerce_integer(&cell)?;
            match i16::try_from(value) {
                Ok(value) => Cell::I16(value),
                Err(_) => out_of_range(&cell, typ)?,
            }
        }
        ColumnType::Integer => {
            let value = coerce_integer(&cell)?;
            match i32::try_from(value) {
                Ok(value) => Cell::I32(value),
                Err(_) => out_of_range(&cell, typ)?,
            }
        }
        ColumnType::BigInt => Cell::I64(coerce_integer(&cell)?),
        ColumnType::Double => coerce_double(cell)?,
        ColumnType::Numeric(Some(decimal)) => decimal.cast(&cell)?,
        ColumnType::Numeric(None) => match cell {
            Cell::String(text) => Cell::Numeric(parse_decimal(text.trim())?),
            other => match other.to_decimal() {
                Some(value) => Cell::Numeric(value),
                None => mismatch(&other, typ)?,
            },
        },
        ColumnType::Text => match cell {
            Cell::String(text) => Cell::String(text),
            other => Cell::String(other.to_string()),
        },
        ColumnType::Date => Cell::from(cell.to_date()?),
        ColumnType::Timestamp => Cell::from(cell.to_timestamp()?),
    };

    Ok(coerced)
}

/// Coerces every value of a row to the matching column type.
pub fn coerce_row(values: Vec<Cell>, types: &[ColumnType]) -> DwhResult<Vec<Cell>> {
    values
        .into_iter()
        .zip(types)
        .map(|(cell, typ)| coerce(cell, typ))
        .collect()
}

fn is_numeric_target(typ: &ColumnType) -> bool {
    typ.is_integer() || matches!(typ, ColumnType::Double | ColumnType::Numeric(_))
}

fn coerce_bool(cell: Cell) -> DwhResult<Cell> {
    let value = match &cell {
        Cell::Bool(value) => *value,
        Cell::I16(value) => *value != 0,
        Cell::I32(value) => *value != 0,
        Cell::I64(value) => *value != 0,
        Cell::String(text) => parse_bool(text)?,
        other => return mismatch(other, &ColumnType::Boolean),
    };

    Ok(Cell::Bool(value))
}

fn coerce_integer(cell: &Cell) -> DwhResult<i64> {
    let value = match cell {
        Cell::I16(value) => Some(i64::from(*value)),
        Cell::I32(value) => Some(i64::from(*value)),
        Cell::I64(value) => Some(*value),
        Cell::Bool(value) => Some(i64::from(*value)),
        Cell::String(text) => {
            let text = text.trim();
            match text.parse::<i64>() {
                Ok(value) => Some(value),
                Err(_) => parse_decimal(text)
                    .ok()
                    .filter(|value| value.is_integer())
                    .and_then(|value| value.to_i64()),
            }
        }
        other => other
            .to_decimal()
            .filter(|value| value.is_integer())
            .and_then(|value| value.to_i64()),
    };

    match value {
        Some(value) => Ok(value),
        None => bail!(
            ErrorKind::ConversionError,
            "Value cannot be stored as an integer",
            format!("{cell:?}")
        ),
    }
}

fn coerce_double(cell: Cell) -> DwhResult<Cell> {
    let value = match &cell {
        Cell::F64(value) => Some(*value),
        Cell::String(text) => text.trim().parse::<f64>().ok(),
        other => other.to_decimal().and_then(|value| value.to_f64()),
    };

    match value {
        Some(value) => Ok(Cell::F64(value)),
        None => mismatch(&cell, &ColumnType::Double),
    }
}

fn mismatch<T>(cell: &Cell, typ: &ColumnType) -> DwhResult<T> {
    bail!(
        ErrorKind::ConversionError,
        "Value does not match the column type",
        format!("{cell:?} cannot be stored as {typ}")
    )
}

fn out_of_range<T>(cell: &Cell, typ: &ColumnType) -> DwhResult<T> {
    bail!(
        ErrorKind::ConversionError,
        "Value is out of range for the column type",
        format!("{cell:?} does not fit {typ}")
    )
}
