use chrono::{NaiveDate, NaiveDateTime};

use crate::catalog::columns::{LOAD_TIMESTAMP, SYMBOL};
use crate::catalog::{COMPANY_DIMENSION, FACT_TABLES, STAGING_TABLES, WarehouseLayout};
use crate::pipeline::Pipeline;
use crate::store::raw::memory::MemoryRawStore;
use crate::store::warehouse::memory::MemoryWarehouse;
use crate::types::{Cell, ColumnSchema, ColumnType, TableRow, TableRows, TableSchema};

/// First and last day seeded into the date dimension by [`memory_pipeline`].
pub const SEEDED_DATES: (&str, &str) = ("2024-01-01", "2025-12-31");

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn timestamp(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, 0, 0).expect("valid time")
}

/// Column layout of the raw table `source` as the extractors write it.
///
/// Alpha Vantage figures arrive as text, including `None` for absent values; market data
/// arrives as doubles.
///
/// # Panics
/// Panics if `source` is not a cataloged raw table.
pub fn raw_schema(source: &str) -> TableSchema {
    let text = |name: &str| ColumnSchema::new(name, ColumnType::Text, true);
    let mut columns = vec![text(SYMBOL)];

    if source == COMPANY_DIMENSION.source {
        columns.extend(COMPANY_DIMENSION.attributes().map(|attribute| text(attribute.name)));
    } else {
        let spec = FACT_TABLES
            .iter()
            .find(|spec| spec.source == source)
            .unwrap_or_else(|| panic!("`{source}` is not a cataloged raw table"));
        let figures_as_text = source.starts_with("alphavantage");

        columns.extend(
            spec.date_keys
                .iter()
                .map(|date_key| ColumnSchema::new(date_key.source_column, ColumnType::Date, true)),
        );
        columns.extend(spec.category.map(|category| text(category.source_column)));
        columns.extend(spec.attributes.iter().map(|attribute| text(attribute.name)));
        columns.extend(spec.measures.iter().map(|measure| {
            let typ = match measure.typ {
                _ if figures_as_text => ColumnType::Text,
                ColumnType::BigInt => ColumnType::BigInt,
                _ => ColumnType::Double,
            };
            ColumnSchema::new(measure.name, typ, true)
        }));
    }
    columns.push(ColumnSchema::new(LOAD_TIMESTAMP, ColumnType::Timestamp, false));

    TableSchema::new(columns)
}

/// Builds a raw row of `source`, leaving unnamed columns null.
///
/// # Panics
/// Panics if a named column is not part of the raw table.
pub fn raw_row(source: &str, values: &[(&str, Cell)]) -> TableRow {
    let schema = raw_schema(source);
    let mut row = TableRow::new(vec![Cell::Null; schema.len()]);
    for (name, value) in values {
        let index = schema
            .index_of(name)
            .unwrap_or_else(|| panic!("`{name}` is not a column of `{source}`"));
        row.set(index, value.clone());
    }

    row
}

pub fn company_row(symbol: &str, sector: &str, loaded_at: NaiveDateTime) -> TableRow {
    raw_row(
        "fmp_company_information",
        &[
            (SYMBOL, Cell::from(symbol)),
            ("company_name", Cell::from(format!("{symbol} Inc."))),
            ("sector", Cell::from(sector)),
            ("full_time_employees", Cell::from("164000")),
            ("ipo_date", Cell::from("1980-12-12")),
            ("is_etf", Cell::from("false")),
            (LOAD_TIMESTAMP, Cell::from(loaded_at)),
        ],
    )
}

pub fn price_row(symbol: &str, day: NaiveDate, close: f64, loaded_at: NaiveDateTime) -> TableRow {
    raw_row(
        "raw_yfinance",
        &[
            (SYMBOL, Cell::from(symbol)),
            ("date", Cell::from(day)),
            ("open_price", Cell::from(close - 1.0)),
            ("close_price", Cell::from(close)),
            ("volume", Cell::I64(48_000_000)),
            (LOAD_TIMESTAMP, Cell::from(loaded_at)),
        ],
    )
}

pub fn market_cap_row(
    symbol: &str,
    day: NaiveDate,
    market_cap: f64,
    loaded_at: NaiveDateTime,
) -> TableRow {
    raw_row(
        "fmp_company_market_cap",
        &[
            (SYMBOL, Cell::from(symbol)),
            ("date", Cell::from(day)),
            ("market_cap", Cell::from(market_cap)),
            (LOAD_TIMESTAMP, Cell::from(loaded_at)),
        ],
    )
}

pub fn income_statement_row(
    symbol: &str,
    fiscal_date: NaiveDate,
    report_type: &str,
    net_income: &str,
    loaded_at: NaiveDateTime,
) -> TableRow {
    raw_row(
        "alphavantage_income_statement",
        &[
            (SYMBOL, Cell::from(symbol)),
            ("fiscal_date_ending", Cell::from(fiscal_date)),
            ("report_type", Cell::from(report_type)),
            ("reported_currency", Cell::from("USD")),
            ("total_revenue", Cell::from("61858000000")),
            ("net_income", Cell::from(net_income)),
            (LOAD_TIMESTAMP, Cell::from(loaded_at)),
        ],
    )
}

pub fn earnings_row(
    symbol: &str,
    fiscal_date: NaiveDate,
    reported_date: Option<NaiveDate>,
    reported_eps: &str,
    loaded_at: NaiveDateTime,
) -> TableRow {
    raw_row(
        "alphavantage_earnings",
        &[
            (SYMBOL, Cell::from(symbol)),
            ("fiscal_date_ending", Cell::from(fiscal_date)),
            ("reported_date", Cell::from(reported_date)),
            ("report_type", Cell::from("quarterly")),
            ("reported_time", Cell::from("post-market")),
            ("reported_eps", Cell::from(reported_eps)),
            ("estimated_eps", Cell::from("2.82")),
            (LOAD_TIMESTAMP, Cell::from(loaded_at)),
        ],
    )
}

/// Creates every cataloged raw table, empty.
pub async fn create_raw_tables(raw: &MemoryRawStore) {
    for spec in STAGING_TABLES {
        raw.create_table(spec.source, raw_schema(spec.source)).await;
    }
}

/// Returns a pipeline over empty in-memory stores, with the warehouse prepared and the
/// date dimension seeded over [`SEEDED_DATES`].
pub async fn memory_pipeline(run_date: NaiveDate) -> Pipeline<MemoryRawStore, MemoryWarehouse> {
    let raw = MemoryRawStore::new();
    create_raw_tables(&raw).await;

    let pipeline = Pipeline::new(raw, MemoryWarehouse::new(), WarehouseLayout::default())
        .with_run_date(run_date);
    pipeline.prepare().await.expect("prepare warehouse");

    let (start, end) = SEEDED_DATES;
    pipeline
        .seed_dates(
            start.parse().expect("valid start date"),
            end.parse().expect("valid end date"),
        )
        .await
        .expect("seed date dimension");

    pipeline
}

/// Returns a pipeline over the stores of `pipeline` running on `run_date`.
pub fn pipeline_on(
    pipeline: &Pipeline<MemoryRawStore, MemoryWarehouse>,
    run_date: NaiveDate,
) -> Pipeline<MemoryRawStore, MemoryWarehouse> {
    Pipeline::new(
        pipeline.raw().clone(),
        pipeline.warehouse().clone(),
        pipeline.layout().clone(),
    )
    .with_run_date(run_date)
}

/// Returns the value of `column` in `row`.
///
/// # Panics
/// Panics if `rows` has no such column.
pub fn value(rows: &TableRows, row: &TableRow, column: &str) -> Cell {
    let index = rows
        .schema
        .index_of(column)
        .unwrap_or_else(|| panic!("no column `{column}`"));

    row.get(index).clone()
}

/// Returns the rows of `rows` whose `column` equals `expected`.
pub fn rows_where<'a>(rows: &'a TableRows, column: &str, expected: &Cell) -> Vec<&'a TableRow> {
    rows.iter()
        .filter(|row| &value(rows, row, column) == expected)
        .collect()
}
