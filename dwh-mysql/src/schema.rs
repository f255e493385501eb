use sqlx::{MySqlExecutor, Row};

use crate::types::TableName;

/// Column of a raw table as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// `DATA_TYPE`, e.g. `decimal` or `datetime`.
    pub data_type: String,
    /// `COLUMN_TYPE`, e.g. `tinyint(1)` or `bigint unsigned`.
    pub column_type: String,
    pub nullable: bool,
}

/// Returns the columns of `table` in the current database, in ordinal order.
///
/// An empty list means the table does not exist.
pub async fn describe_table<'c, E>(
    executor: E,
    table: &TableName,
) -> Result<Vec<ColumnDescription>, sqlx::Error>
where
    E: MySqlExecutor<'c>,
{
    let rows = sqlx::query(
        r#"
        SELECT CAST(column_name AS CHAR) AS column_name,
               CAST(data_type AS CHAR) AS data_type,
               CAST(column_type AS CHAR) AS column_type,
               CAST(is_nullable AS CHAR) AS is_nullable
        FROM information_schema.columns
        WHERE table_schema = DATABASE() AND table_name = ?
        ORDER BY ordinal_position
        "#,
    )
    .bind(&table.name)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            let is_nullable: String = row.try_get("is_nullable")?;

            Ok(ColumnDescription {
                name: row.try_get("column_name")?,
                data_type: row.try_get::<String, _>("data_type")?.to_lowercase(),
                column_type: row.try_get::<String, _>("column_type")?.to_lowercase(),
                nullable: is_nullable == "YES",
            })
        })
        .collect()
}
