//! Declarative description of every table the loader moves or builds.
//!
//! The transfer, dimension and fact engines are generic; everything table specific (source
//! names, natural keys, tracked attributes, measures and their precision) lives here.

use chrono::{Datelike, NaiveDate, Weekday};

pub mod columns;
mod financial;
mod layout;

pub use financial::{
    COMPANY_DIMENSION, DATE_DIMENSION, FACT_TABLES, REPORT_TYPE_CODE_WIDTH, STAGING_TABLES,
};
pub use layout::WarehouseLayout;

use crate::catalog::columns::{
    COMPANY_KEY, DATE_KEY, DAY, DAY_OF_WEEK, DW_LOAD_TIMESTAMP, FULL_DATE, IS_CURRENT,
    IS_WEEKEND, MONTH, QUARTER, VALID_FROM_DATE, VALID_TO_DATE, YEAR,
};
use crate::types::{Cell, ColumnSchema, ColumnType, DateKey, TableRow, TableSchema};

/// A named, typed attribute of a dimension or fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub typ: ColumnType,
}

impl AttributeSpec {
    pub const fn new(name: &'static str, typ: ColumnType) -> Self {
        Self { name, typ }
    }

    fn column(&self) -> ColumnSchema {
        ColumnSchema::new(self.name, self.typ, true)
    }
}

/// Copy policy of one raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingSpec {
    /// Raw table name, also the suffix of the `stg_` copy.
    pub source: &'static str,
    /// Monotonic lineage column used for incremental copies. Tables without one are always
    /// copied in full.
    pub watermark_column: Option<&'static str>,
}

impl StagingSpec {
    pub fn staging_name(&self) -> String {
        format!("stg_{}", self.source)
    }
}

/// SCD type 2 dimension built from one staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    pub name: &'static str,
    /// Raw table whose staging copy feeds the dimension.
    pub source: &'static str,
    pub natural_key: &'static str,
    /// Attributes whose change opens a new version.
    pub tracked: &'static [AttributeSpec],
    /// Attributes copied into new versions without being compared.
    pub passthrough: &'static [AttributeSpec],
}

impl DimensionSpec {
    /// Attributes written into every new version, tracked ones first.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.tracked.iter().chain(self.passthrough)
    }

    /// Full column layout of the dimension table.
    pub fn table_schema(&self) -> TableSchema {
        let mut columns = vec![
            ColumnSchema::new(COMPANY_KEY, ColumnType::BigInt, false),
            ColumnSchema::new(self.natural_key, ColumnType::Text, false),
        ];
        columns.extend(self.attributes().map(AttributeSpec::column));
        columns.extend([
            ColumnSchema::new(VALID_FROM_DATE, ColumnType::Date, false),
            ColumnSchema::new(VALID_TO_DATE, ColumnType::Date, true),
            ColumnSchema::new(IS_CURRENT, ColumnType::Boolean, false),
            ColumnSchema::new(DW_LOAD_TIMESTAMP, ColumnType::Timestamp, false),
        ]);

        TableSchema::new(columns)
    }
}

/// A surrogate date key of a fact and the staging column it is resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateKeySpec {
    pub key_column: &'static str,
    pub source_column: &'static str,
    /// Required keys are part of the natural key and must resolve. Optional keys resolve a
    /// null source date to a null key.
    pub required: bool,
}

/// Category code of a fact, derived from a free-text source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub key_column: &'static str,
    pub source_column: &'static str,
    /// Number of leading characters kept before upper-casing.
    pub width: usize,
}

impl CategorySpec {
    /// Derives the category code, e.g. `quarterly` becomes `QUARTER` with a width of 7.
    pub fn code(&self, value: &str) -> String {
        let prefix = value.trim().chars().take(self.width).collect::<String>();

        prefix.trim_end().to_uppercase()
    }
}

/// Fact table fed by one staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactSpec {
    pub name: &'static str,
    /// Raw table whose staging copy feeds the fact.
    pub source: &'static str,
    /// Staging column holding the company natural key.
    pub entity_column: &'static str,
    pub date_keys: &'static [DateKeySpec],
    pub category: Option<CategorySpec>,
    /// Descriptive columns copied as-is and overwritten on conflict.
    pub attributes: &'static [AttributeSpec],
    /// Measures, stored with the precision of their type.
    pub measures: &'static [AttributeSpec],
}

impl FactSpec {
    /// Columns forming the natural composite key, in constraint order.
    pub fn natural_key(&self) -> Vec<&'static str> {
        let mut key = vec![COMPANY_KEY];
        key.extend(
            self.date_keys
                .iter()
                .filter(|date_key| date_key.required)
                .map(|date_key| date_key.key_column),
        );
        key.extend(self.category.map(|category| category.key_column));

        key
    }

    /// Full column layout of the fact table, in the order rows are written.
    pub fn table_schema(&self) -> TableSchema {
        let mut columns = vec![ColumnSchema::new(COMPANY_KEY, ColumnType::BigInt, false)];
        columns.extend(self.date_keys.iter().map(|date_key| {
            ColumnSchema::new(date_key.key_column, ColumnType::Integer, !date_key.required)
        }));
        if let Some(category) = self.category {
            columns.push(ColumnSchema::new(category.key_column, ColumnType::Text, false));
        }
        columns.extend(self.attributes.iter().map(AttributeSpec::column));
        columns.extend(self.measures.iter().map(AttributeSpec::column));
        columns.push(ColumnSchema::new(
            DW_LOAD_TIMESTAMP,
            ColumnType::Timestamp,
            false,
        ));

        TableSchema::new(columns)
    }
}

/// Column layout of the date dimension.
pub fn date_dimension_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new(DATE_KEY, ColumnType::Integer, false),
        ColumnSchema::new(FULL_DATE, ColumnType::Date, false),
        ColumnSchema::new(YEAR, ColumnType::SmallInt, false),
        ColumnSchema::new(QUARTER, ColumnType::SmallInt, false),
        ColumnSchema::new(MONTH, ColumnType::SmallInt, false),
        ColumnSchema::new(DAY, ColumnType::SmallInt, false),
        ColumnSchema::new(DAY_OF_WEEK, ColumnType::SmallInt, false),
        ColumnSchema::new(IS_WEEKEND, ColumnType::Boolean, false),
    ])
}

/// Builds the date dimension row of `date`.
pub fn date_dimension_row(date: NaiveDate) -> TableRow {
    let weekday = date.weekday();
    // Calendar fields fit in a smallint.
    let small = |value: u32| Cell::I16(value as i16);

    TableRow::new(vec![
        Cell::I32(DateKey::for_date(date).0),
        Cell::Date(date),
        Cell::I16(date.year() as i16),
        small(date.month0() / 3 + 1),
        small(date.month()),
        small(date.day()),
        small(weekday.number_from_monday()),
        Cell::Bool(matches!(weekday, Weekday::Sat | Weekday::Sun)),
    ])
}

/// Returns the staging policy of the raw table `source`.
pub fn staging_spec(source: &str) -> Option<&'static StagingSpec> {
    STAGING_TABLES.iter().find(|spec| spec.source == source)
}

/// Returns the fact definition named `name`.
pub fn fact_spec(name: &str) -> Option<&'static FactSpec> {
    FACT_TABLES.iter().find(|spec| spec.name == name)
}
