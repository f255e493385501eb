use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{DwhResult, ErrorKind};
use crate::store::raw::RawStore;
use crate::types::{TableRow, TableRows, TableSchema, Watermark};

/// Raw store keeping tables in memory, used by tests in place of MySQL.
#[derive(Debug, Clone, Default)]
pub struct MemoryRawStore {
    tables: Arc<Mutex<HashMap<String, TableRows>>>,
}

impl MemoryRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` with `schema`, replacing any previous content.
    pub async fn create_table(&self, table: &str, schema: TableSchema) {
        let mut tables = self.tables.lock().await;
        tables.insert(table.to_string(), TableRows::empty(schema));
    }

    /// Appends rows to `table`, as an extractor would.
    pub async fn insert_rows(&self, table: &str, rows: Vec<TableRow>) -> DwhResult<()> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.get_mut(table) else {
            bail!(
                ErrorKind::SourceTableMissing,
                "Raw table does not exist",
                table
            );
        };
        existing.rows.extend(rows);

        Ok(())
    }

    async fn table(&self, table: &str) -> DwhResult<TableRows> {
        let tables = self.tables.lock().await;
        match tables.get(table) {
            Some(rows) => Ok(rows.clone()),
            None => bail!(
                ErrorKind::SourceTableMissing,
                "Raw table does not exist",
                table
            ),
        }
    }
}

impl RawStore for MemoryRawStore {
    async fn table_schema(&self, table: &str) -> DwhResult<TableSchema> {
        Ok(self.table(table).await?.schema)
    }

    async fn read_all(&self, table: &str) -> DwhResult<TableRows> {
        self.table(table).await
    }

    async fn read_since(
        &self,
        table: &str,
        column: &str,
        watermark: Watermark,
    ) -> DwhResult<TableRows> {
        let TableRows { schema, rows } = self.table(table).await?;
        let index = schema.require(table, column)?;

        let mut selected = Vec::new();
        for row in rows {
            if let Some(lineage) = row.get(index).to_timestamp()?
                && watermark.admits(lineage)
            {
                selected.push((lineage, row));
            }
        }
        selected.sort_by_key(|(lineage, _)| *lineage);

        Ok(TableRows::new(
            schema,
            selected.into_iter().map(|(_, row)| row).collect(),
        ))
    }
}
