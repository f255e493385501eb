use sqlx::{PgExecutor, Row};

use crate::types::TableName;

/// Column of an existing warehouse table as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// `information_schema.columns.data_type`, e.g. `numeric` or `timestamp without time zone`.
    pub data_type: String,
    pub nullable: bool,
}

/// Returns whether `table` resolves to an existing relation.
pub async fn table_exists<'c, E>(executor: E, table: &TableName) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let exists: bool = sqlx::query_scalar("select to_regclass($1) is not null")
        .bind(table.as_quoted_identifier())
        .fetch_one(executor)
        .await?;

    Ok(exists)
}

/// Returns the columns of `table` in ordinal order, or an empty list when it does not exist.
pub async fn describe_table<'c, E>(
    executor: E,
    table: &TableName,
) -> Result<Vec<ColumnDescription>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let rows = sqlx::query(
        r#"
        select column_name::text as column_name,
               data_type::text as data_type,
               is_nullable::text as is_nullable
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.name)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            let is_nullable: String = row.try_get("is_nullable")?;

            Ok(ColumnDescription {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                nullable: is_nullable == "YES",
            })
        })
        .collect()
}
