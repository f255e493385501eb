use chrono::{NaiveDate, NaiveDateTime};
use dwh_postgres::types::TableName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::catalog::{DimensionSpec, FactSpec, WarehouseLayout};
use crate::error::{DwhResult, ErrorKind};
use crate::store::warehouse::{
    DateStore, DimensionChanges, DimensionStore, FactBatch, FactStore, LineageStore,
    StagingStore, UpsertCounts, WarehouseAdmin,
};
use crate::types::{CompanyKey, DateKey, TableRows, Watermark};

/// Warehouse wrapper failing every write to chosen tables.
///
/// Tables are matched on their unqualified name. Reads and writes to other tables are
/// delegated to the wrapped warehouse.
#[derive(Debug, Clone)]
pub struct FaultyWarehouse<W> {
    inner: W,
    failing: Arc<Mutex<HashMap<String, ErrorKind>>>,
}

impl<W> FaultyWarehouse<W> {
    pub fn wrap(inner: W) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    /// Makes writes to `table` fail with `kind` until [`Self::heal`] is called.
    pub async fn fail_writes(&self, table: &str, kind: ErrorKind) {
        self.failing.lock().await.insert(table.to_string(), kind);
    }

    pub async fn heal(&self, table: &str) {
        self.failing.lock().await.remove(table);
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    async fn check_write(&self, table: &TableName) -> DwhResult<()> {
        let failing = self.failing.lock().await;
        if let Some(kind) = failing.get(&table.name) {
            bail!(*kind, "Injected write failure", table.to_string());
        }

        Ok(())
    }
}

impl<W> LineageStore for FaultyWarehouse<W>
where
    W: LineageStore + Send + Sync,
{
    async fn max_lineage(
        &self,
        table: &TableName,
        column: &str,
    ) -> DwhResult<Option<NaiveDateTime>> {
        self.inner.max_lineage(table, column).await
    }
}

impl<W> StagingStore for FaultyWarehouse<W>
where
    W: StagingStore + Send + Sync,
{
    async fn replace_table(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        self.check_write(table).await?;
        self.inner.replace_table(table, rows).await
    }

    async fn append_rows(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        self.check_write(table).await?;
        self.inner.append_rows(table, rows).await
    }

    async fn read_staged(
        &self,
        table: &TableName,
        lineage_column: &str,
        since: Watermark,
    ) -> DwhResult<Option<TableRows>> {
        self.inner.read_staged(table, lineage_column, since).await
    }

    async fn read_staged_by_entity(
        &self,
        table: &TableName,
        lineage_column: &str,
        entity_column: &str,
        watermarks: &HashMap<String, NaiveDateTime>,
    ) -> DwhResult<Option<TableRows>> {
        self.inner
            .read_staged_by_entity(table, lineage_column, entity_column, watermarks)
            .await
    }
}

impl<W> DimensionStore for FaultyWarehouse<W>
where
    W: DimensionStore + Send + Sync,
{
    async fn current_versions(
        &self,
        table: &TableName,
        spec: &DimensionSpec,
    ) -> DwhResult<TableRows> {
        self.inner.current_versions(table, spec).await
    }

    async fn apply_versions(&self, table: &TableName, changes: DimensionChanges) -> DwhResult<()> {
        self.check_write(table).await?;
        self.inner.apply_versions(table, changes).await
    }

    async fn company_keys(
        &self,
        table: &TableName,
        symbols: &[String],
    ) -> DwhResult<HashMap<String, CompanyKey>> {
        self.inner.company_keys(table, symbols).await
    }
}

impl<W> DateStore for FaultyWarehouse<W>
where
    W: DateStore + Send + Sync,
{
    async fn date_keys(
        &self,
        table: &TableName,
        dates: &[NaiveDate],
    ) -> DwhResult<HashMap<NaiveDate, DateKey>> {
        self.inner.date_keys(table, dates).await
    }

    async fn seed_dates(&self, table: &TableName, start: NaiveDate, end: NaiveDate) -> DwhResult<u64> {
        self.check_write(table).await?;
        self.inner.seed_dates(table, start, end).await
    }
}

impl<W> FactStore for FaultyWarehouse<W>
where
    W: FactStore + Send + Sync,
{
    async fn entity_watermarks(
        &self,
        fact: &TableName,
        dimension: &TableName,
        natural_key: &str,
    ) -> DwhResult<HashMap<String, NaiveDateTime>> {
        self.inner.entity_watermarks(fact, dimension, natural_key).await
    }

    async fn upsert_facts(&self, fact: &TableName, batch: FactBatch) -> DwhResult<UpsertCounts> {
        self.check_write(fact).await?;
        self.inner.upsert_facts(fact, batch).await
    }
}

impl<W> WarehouseAdmin for FaultyWarehouse<W>
where
    W: WarehouseAdmin + Send + Sync,
{
    async fn prepare(&self, layout: &WarehouseLayout) -> DwhResult<()> {
        self.inner.prepare(layout).await
    }

    async fn ensure_dimension(
        &self,
        layout: &WarehouseLayout,
        spec: &DimensionSpec,
    ) -> DwhResult<bool> {
        self.inner.ensure_dimension(layout, spec).await
    }

    async fn ensure_fact(
        &self,
        layout: &WarehouseLayout,
        spec: &FactSpec,
        dimension: &DimensionSpec,
    ) -> DwhResult<bool> {
        self.inner.ensure_fact(layout, spec, dimension).await
    }
}
