use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::mysql::MySqlRow;

use crate::error::{DwhError, DwhResult};
use crate::types::{Cell, ColumnType, TableRow, TableSchema};

/// Decodes a raw store row whose columns follow `schema`.
///
/// Integer columns are read as [`Cell::I64`]; unsigned values beyond the signed range
/// become decimals. Values are narrowed to the destination type when they are written.
pub fn decode_mysql_row(row: &MySqlRow, schema: &TableSchema) -> DwhResult<TableRow> {
    let mut values = Vec::with_capacity(schema.len());
    for (index, column) in schema.columns.iter().enumerate() {
        let cell = decode_cell(row, index, &column.typ).map_err(DwhError::source_sqlx)?;
        values.push(cell);
    }

    Ok(TableRow::new(values))
}

fn decode_cell(row: &MySqlRow, index: usize, typ: &ColumnType) -> Result<Cell, sqlx::Error> {
    let cell = match typ {
        ColumnType::Boolean => match row.try_get::<Option<bool>, _>(index) {
            Ok(value) => Cell::from(value),
            Err(_) => Cell::from(row.try_get::<Option<i64>, _>(index)?.map(|value| value != 0)),
        },
        ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => decode_integer(row, index)?,
        ColumnType::Double => match row.try_get::<Option<f64>, _>(index) {
            Ok(value) => Cell::from(value),
            Err(_) => Cell::from(row.try_get::<Option<f32>, _>(index)?.map(f64::from)),
        },
        ColumnType::Numeric(_) => match row.try_get::<Option<BigDecimal>, _>(index) {
            Ok(value) => Cell::from(value),
            Err(_) => decode_integer(row, index)?,
        },
        ColumnType::Text => match row.try_get::<Option<String>, _>(index) {
            Ok(value) => Cell::from(value),
            Err(_) => Cell::from(
                row.try_get::<Option<Vec<u8>>, _>(index)?
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            ),
        },
        ColumnType::Date => Cell::from(row.try_get::<Option<NaiveDate>, _>(index)?),
        ColumnType::Timestamp => match row.try_get::<Option<NaiveDateTime>, _>(index) {
            Ok(value) => Cell::from(value),
            Err(_) => Cell::from(
                row.try_get::<Option<DateTime<Utc>>, _>(index)?
                    .map(|value| value.naive_utc()),
            ),
        },
    };

    Ok(cell)
}

fn decode_integer(row: &MySqlRow, index: usize) -> Result<Cell, sqlx::Error> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(Cell::from(value));
    }

    let cell = match row.try_get::<Option<u64>, _>(index)? {
        Some(value) => match i64::try_from(value) {
            Ok(value) => Cell::I64(value),
            Err(_) => Cell::Numeric(BigDecimal::from(value)),
        },
        None => Cell::Null,
    };

    Ok(cell)
}
