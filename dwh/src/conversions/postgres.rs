use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use dwh_postgres::types::quote_column;
use sqlx::Row;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::query_builder::Separated;

use crate::conversions::coerce::coerce;
use crate::error::DwhResult;
use crate::types::{Cell, ColumnType, TableRow, TableSchema};

/// Returns a select list that casts every column to the type it is decoded as.
///
/// Columns described with types outside the supported set are read through their text
/// representation.
pub fn typed_select_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|column| {
            let name = quote_column(&column.name);
            format!("{name}::{} as {name}", column.typ.pg_type())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decodes a warehouse row selected with [`typed_select_list`].
pub fn decode_pg_row(row: &PgRow, schema: &TableSchema) -> DwhResult<TableRow> {
    let mut values = Vec::with_capacity(schema.len());
    for (index, column) in schema.columns.iter().enumerate() {
        let cell = match column.typ {
            ColumnType::Boolean => Cell::from(row.try_get::<Option<bool>, _>(index)?),
            ColumnType::SmallInt => row
                .try_get::<Option<i16>, _>(index)?
                .map(Cell::I16)
                .unwrap_or(Cell::Null),
            ColumnType::Integer => row
                .try_get::<Option<i32>, _>(index)?
                .map(Cell::I32)
                .unwrap_or(Cell::Null),
            ColumnType::BigInt => Cell::from(row.try_get::<Option<i64>, _>(index)?),
            ColumnType::Double => Cell::from(row.try_get::<Option<f64>, _>(index)?),
            ColumnType::Numeric(_) => Cell::from(row.try_get::<Option<BigDecimal>, _>(index)?),
            ColumnType::Text => Cell::from(row.try_get::<Option<String>, _>(index)?),
            ColumnType::Date => Cell::from(row.try_get::<Option<NaiveDate>, _>(index)?),
            ColumnType::Timestamp => Cell::from(row.try_get::<Option<NaiveDateTime>, _>(index)?),
        };
        values.push(cell);
    }

    Ok(TableRow::new(values))
}

/// Coerces `cell` to `typ` and binds it, binding nulls with the column's own type.
pub fn push_cell(
    separated: &mut Separated<'_, '_, Postgres, &'static str>,
    cell: Cell,
    typ: &ColumnType,
) -> DwhResult<()> {
    match coerce(cell, typ)? {
        Cell::Null => push_null(separated, typ),
        Cell::Bool(value) => {
            separated.push_bind(value);
        }
        Cell::I16(value) => {
            separated.push_bind(value);
        }
        Cell::I32(value) => {
            separated.push_bind(value);
        }
        Cell::I64(value) => {
            separated.push_bind(value);
        }
        Cell::F64(value) => {
            separated.push_bind(value);
        }
        Cell::Numeric(value) => {
            separated.push_bind(value);
        }
        Cell::String(value) => {
            separated.push_bind(value);
        }
        Cell::Date(value) => {
            separated.push_bind(value);
        }
        Cell::Timestamp(value) => {
            separated.push_bind(value);
        }
    }

    Ok(())
}

fn push_null(separated: &mut Separated<'_, '_, Postgres, &'static str>, typ: &ColumnType) {
    match typ {
        ColumnType::Boolean => separated.push_bind(None::<bool>),
        ColumnType::SmallInt => separated.push_bind(None::<i16>),
        ColumnType::Integer => separated.push_bind(None::<i32>),
        ColumnType::BigInt => separated.push_bind(None::<i64>),
        ColumnType::Double => separated.push_bind(None::<f64>),
        ColumnType::Numeric(_) => separated.push_bind(None::<BigDecimal>),
        ColumnType::Text => separated.push_bind(None::<String>),
        ColumnType::Date => separated.push_bind(None::<NaiveDate>),
        ColumnType::Timestamp => separated.push_bind(None::<NaiveDateTime>),
    };
}
