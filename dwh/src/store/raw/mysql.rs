use dwh_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use dwh_mysql::schema::describe_table;
use dwh_mysql::types::{TableName, quote_identifier};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;
use tracing::debug;

use crate::bail;
use crate::conversions::mysql::decode_mysql_row;
use crate::error::{DwhError, DwhResult, ErrorKind};
use crate::store::raw::RawStore;
use crate::types::{ColumnSchema, ColumnType, TableRows, TableSchema, Watermark};

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a lazily connected pool; no connection is opened until the first query.
fn create_database_pool(config: &MySqlConnectionConfig, max_connections: u32) -> MySqlPool {
    let options = config.with_db();

    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(options)
}

/// Raw store backed by the MySQL database the extractors write to.
#[derive(Debug, Clone)]
pub struct MySqlRawStore {
    pool: MySqlPool,
}

impl MySqlRawStore {
    pub fn new(config: &MySqlConnectionConfig, max_connections: u32) -> Self {
        Self {
            pool: create_database_pool(config, max_connections),
        }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Returns the table schema and a select list naming every column.
    async fn select_list(&self, table: &TableName) -> DwhResult<(TableSchema, String)> {
        let schema = self.table_schema(&table.name).await?;
        let columns = schema
            .names()
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(", ");

        Ok((schema, columns))
    }
}

impl RawStore for MySqlRawStore {
    async fn table_schema(&self, table: &str) -> DwhResult<TableSchema> {
        let table_name = TableName::new(table);
        let descriptions = describe_table(&self.pool, &table_name)
            .await
            .map_err(DwhError::source_sqlx)?;

        if descriptions.is_empty() {
            bail!(
                ErrorKind::SourceTableMissing,
                "Raw table does not exist",
                table
            );
        }

        let columns = descriptions
            .into_iter()
            .map(|column| {
                let typ = ColumnType::from_mysql(&column.data_type, &column.column_type)?;
                Ok(ColumnSchema::new(column.name, typ, column.nullable))
            })
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(TableSchema::new(columns))
    }

    async fn read_all(&self, table: &str) -> DwhResult<TableRows> {
        let table_name = TableName::new(table);
        let (schema, columns) = self.select_list(&table_name).await?;

        let query = format!(
            "SELECT {columns} FROM {}",
            table_name.as_quoted_identifier()
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(DwhError::source_sqlx)?;
        debug!(table, rows = rows.len(), "read raw table");

        let rows = rows
            .iter()
            .map(|row| decode_mysql_row(row, &schema))
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(TableRows::new(schema, rows))
    }

    async fn read_since(
        &self,
        table: &str,
        column: &str,
        watermark: Watermark,
    ) -> DwhResult<TableRows> {
        let table_name = TableName::new(table);
        let (schema, columns) = self.select_list(&table_name).await?;
        schema.require(table, column)?;

        let column = quote_identifier(column);
        let query = format!(
            "SELECT {columns} FROM {} WHERE {column} > ? ORDER BY {column}",
            table_name.as_quoted_identifier()
        );
        let rows = sqlx::query(&query)
            .bind(watermark.timestamp())
            .fetch_all(&self.pool)
            .await
            .map_err(DwhError::source_sqlx)?;
        debug!(table, %watermark, rows = rows.len(), "read raw rows past watermark");

        let rows = rows
            .iter()
            .map(|row| decode_mysql_row(row, &schema))
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(TableRows::new(schema, rows))
    }
}
