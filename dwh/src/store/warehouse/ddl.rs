//! DDL of the dimensional schema.

use dwh_postgres::types::{TableName, quote_column};
use pg_escape::quote_identifier;

use crate::catalog::columns::{COMPANY_KEY, DATE_KEY, FULL_DATE, IS_CURRENT};
use crate::catalog::{
    COMPANY_DIMENSION, DimensionSpec, FACT_TABLES, FactSpec, WarehouseLayout,
    date_dimension_schema,
};
use crate::types::{ColumnSchema, TableSchema};

fn column_definition(column: &ColumnSchema) -> String {
    let mut definition = format!("{} {}", quote_column(&column.name), column.typ.pg_type());
    if !column.nullable {
        definition.push_str(" not null");
    }

    definition
}

/// Builds `create table if not exists` with the columns of `schema` followed by
/// `constraints`. Columns named in `overrides` use the given definition instead.
fn create_table(
    table: &TableName,
    schema: &TableSchema,
    overrides: &[(&str, &str)],
    constraints: Vec<String>,
) -> String {
    let mut lines = schema
        .columns
        .iter()
        .map(|column| {
            match overrides.iter().find(|(name, _)| *name == column.name) {
                Some((name, definition)) => format!("{} {definition}", quote_column(name)),
                None => column_definition(column),
            }
        })
        .collect::<Vec<_>>();
    lines.extend(constraints);

    format!(
        "create table if not exists {} (\n    {}\n)",
        table.as_quoted_identifier(),
        lines.join(",\n    ")
    )
}

/// Creates the date dimension, keyed by `YYYYMMDD` with one row per calendar date.
pub fn date_dimension(table: &TableName) -> Vec<String> {
    vec![create_table(
        table,
        &date_dimension_schema(),
        &[],
        vec![
            format!("constraint {} primary key ({DATE_KEY})", table.derived_name("pkey")),
            format!("constraint {} unique ({FULL_DATE})", table.derived_name("full_date_key")),
        ],
    )]
}

/// Creates an SCD2 dimension and the index keeping a single current version per natural
/// key.
pub fn dimension(table: &TableName, spec: &DimensionSpec) -> Vec<String> {
    vec![
        create_table(
            table,
            &spec.table_schema(),
            &[(COMPANY_KEY, "bigserial primary key")],
            vec![],
        ),
        format!(
            "create unique index if not exists {} on {} ({}) where {IS_CURRENT}",
            table.derived_name("current_key"),
            table.as_quoted_identifier(),
            quote_column(spec.natural_key),
        ),
    ]
}

/// Creates a fact table referencing the company and date dimensions, unique on its
/// natural key.
pub fn fact(
    table: &TableName,
    spec: &FactSpec,
    dimension: &TableName,
    date_dimension: &TableName,
) -> Vec<String> {
    let mut constraints = vec![format!(
        "constraint {} foreign key ({COMPANY_KEY}) references {} ({COMPANY_KEY})",
        table.derived_name(COMPANY_KEY),
        dimension.as_quoted_identifier()
    )];
    for date_key in spec.date_keys {
        constraints.push(format!(
            "constraint {} foreign key ({}) references {} ({DATE_KEY})",
            table.derived_name(date_key.key_column),
            quote_column(date_key.key_column),
            date_dimension.as_quoted_identifier()
        ));
    }

    let natural_key = spec
        .natural_key()
        .into_iter()
        .map(quote_column)
        .collect::<Vec<_>>()
        .join(", ");
    constraints.push(format!(
        "constraint {} unique ({natural_key})",
        table.derived_name("natural_key")
    ));

    vec![create_table(table, &spec.table_schema(), &[], constraints)]
}

fn create_schema(schema: &str) -> String {
    format!("create schema if not exists {}", quote_identifier(schema))
}

/// Statements creating the dimension of `spec` and the warehouse schema holding it.
pub fn dimension_ddl(layout: &WarehouseLayout, spec: &DimensionSpec) -> Vec<String> {
    let mut statements = vec![create_schema(&layout.warehouse_schema)];
    statements.extend(dimension(&layout.dimension_table(spec), spec));

    statements
}

/// Statements creating the fact table of `spec` preceded by the dimensions it references.
pub fn fact_ddl(
    layout: &WarehouseLayout,
    spec: &FactSpec,
    dimension: &DimensionSpec,
) -> Vec<String> {
    let date_table = layout.date_dimension();
    let mut statements = dimension_ddl(layout, dimension);
    statements.extend(date_dimension(&date_table));
    statements.extend(fact(
        &layout.fact_table(spec),
        spec,
        &layout.dimension_table(dimension),
        &date_table,
    ));

    statements
}

/// Every statement creating the staging and warehouse structure, in dependency order.
pub fn warehouse_ddl(layout: &WarehouseLayout) -> Vec<String> {
    let mut statements = vec![
        create_schema(&layout.staging_schema),
        create_schema(&layout.warehouse_schema),
    ];

    let date_table = layout.date_dimension();
    let dimension_table = layout.dimension_table(&COMPANY_DIMENSION);
    statements.extend(date_dimension(&date_table));
    statements.extend(dimension(&dimension_table, &COMPANY_DIMENSION));
    for spec in FACT_TABLES {
        statements.extend(fact(
            &layout.fact_table(spec),
            spec,
            &dimension_table,
            &date_table,
        ));
    }

    statements
}

/// Creates a staging table shaped like the rows copied into it.
pub fn staging_table(table: &TableName, schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|column| format!("{} {}", quote_column(&column.name), column.typ.pg_type()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "create table if not exists {} ({columns})",
        table.as_quoted_identifier()
    )
}

/// Adds a column that appeared in the source to an existing staging table.
pub fn add_staging_column(table: &TableName, column: &ColumnSchema) -> String {
    format!(
        "alter table {} add column if not exists {} {}",
        table.as_quoted_identifier(),
        quote_column(&column.name),
        column.typ.pg_type()
    )
}
