use chrono::{NaiveDate, NaiveDateTime};
use dwh_postgres::types::TableName;
use std::collections::HashMap;
use std::future::Future;

use crate::catalog::{DimensionSpec, FactSpec, WarehouseLayout};
use crate::error::DwhResult;
use crate::types::{CompanyKey, DateKey, TableRow, TableRows, TableSchema, Watermark};

/// Reads lineage maxima from warehouse tables.
pub trait LineageStore {
    /// Returns `MAX(column)` of `table`, or `None` when the table is empty or does not exist.
    fn max_lineage(
        &self,
        table: &TableName,
        column: &str,
    ) -> impl Future<Output = DwhResult<Option<NaiveDateTime>>> + Send;
}

/// Writes and reads the `stg_<table>` copies.
pub trait StagingStore {
    /// Replaces `table` with `rows`, created from the shape of the rows, atomically.
    ///
    /// Returns the number of rows written.
    fn replace_table(
        &self,
        table: &TableName,
        rows: TableRows,
    ) -> impl Future<Output = DwhResult<u64>> + Send;

    /// Appends `rows` to `table` in one transaction, creating the table or adding columns
    /// that appeared in the source when needed.
    ///
    /// Returns the number of rows written.
    fn append_rows(
        &self,
        table: &TableName,
        rows: TableRows,
    ) -> impl Future<Output = DwhResult<u64>> + Send;

    /// Returns the rows of `table` whose `lineage_column` is newer than `since`, ordered by
    /// lineage, or `None` when the table does not exist.
    fn read_staged(
        &self,
        table: &TableName,
        lineage_column: &str,
        since: Watermark,
    ) -> impl Future<Output = DwhResult<Option<TableRows>>> + Send;

    /// Returns the rows of `table` newer than the watermark of their entity, ordered by
    /// lineage, or `None` when the table does not exist.
    ///
    /// The entity of a row is the trimmed text of `entity_column`. Entities missing from
    /// `watermarks` are read from the beginning.
    fn read_staged_by_entity(
        &self,
        table: &TableName,
        lineage_column: &str,
        entity_column: &str,
        watermarks: &HashMap<String, NaiveDateTime>,
    ) -> impl Future<Output = DwhResult<Option<TableRows>>> + Send;
}

/// Closes the validity interval of a dimension version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
    pub company_key: CompanyKey,
    pub valid_to: NaiveDate,
}

/// Versions to expire and versions to insert, applied together.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionChanges {
    pub expirations: Vec<Expiration>,
    /// New current versions. The schema holds every dimension column except the surrogate
    /// key, which the store assigns.
    pub versions: TableRows,
}

impl DimensionChanges {
    pub fn is_empty(&self) -> bool {
        self.expirations.is_empty() && self.versions.is_empty()
    }
}

/// Versioned company dimension.
pub trait DimensionStore {
    /// Returns the current version of every natural key, with the columns of
    /// [`DimensionSpec::table_schema`].
    fn current_versions(
        &self,
        table: &TableName,
        spec: &DimensionSpec,
    ) -> impl Future<Output = DwhResult<TableRows>> + Send;

    /// Expires and inserts versions in one transaction.
    fn apply_versions(
        &self,
        table: &TableName,
        changes: DimensionChanges,
    ) -> impl Future<Output = DwhResult<()>> + Send;

    /// Returns the surrogate keys of the current versions of `symbols`. Symbols without a
    /// current version are absent from the result.
    fn company_keys(
        &self,
        table: &TableName,
        symbols: &[String],
    ) -> impl Future<Output = DwhResult<HashMap<String, CompanyKey>>> + Send;

}

/// Calendar date dimension.
pub trait DateStore {
    /// Returns the keys of `dates`. Dates missing from the dimension are absent.
    fn date_keys(
        &self,
        table: &TableName,
        dates: &[NaiveDate],
    ) -> impl Future<Output = DwhResult<HashMap<NaiveDate, DateKey>>> + Send;

    /// Adds every day from `start` to `end` inclusive, keeping existing days.
    ///
    /// Returns the number of days added.
    fn seed_dates(
        &self,
        table: &TableName,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = DwhResult<u64>> + Send;
}

/// Fact rows ready to be upserted on their natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct FactBatch {
    pub schema: TableSchema,
    pub natural_key: Vec<&'static str>,
    pub rows: Vec<TableRow>,
}

/// Rows inserted and updated by an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

/// Fact tables.
pub trait FactStore {
    /// Returns, per natural key of the dimension, the greatest lineage of the fact rows
    /// referencing any version of it. Keys without fact rows are absent.
    fn entity_watermarks(
        &self,
        fact: &TableName,
        dimension: &TableName,
        natural_key: &str,
    ) -> impl Future<Output = DwhResult<HashMap<String, NaiveDateTime>>> + Send;

    /// Inserts the batch, overwriting every non-key column of rows whose natural key
    /// already exists, in one transaction.
    fn upsert_facts(
        &self,
        fact: &TableName,
        batch: FactBatch,
    ) -> impl Future<Output = DwhResult<UpsertCounts>> + Send;
}

/// Creates the warehouse structure.
pub trait WarehouseAdmin {
    /// Creates the schemas, the date and company dimensions and every fact table when they
    /// do not exist yet.
    fn prepare(&self, layout: &WarehouseLayout) -> impl Future<Output = DwhResult<()>> + Send;

    /// Creates the dimension of `spec` when it does not exist yet.
    ///
    /// Returns whether the table was created.
    fn ensure_dimension(
        &self,
        layout: &WarehouseLayout,
        spec: &DimensionSpec,
    ) -> impl Future<Output = DwhResult<bool>> + Send;

    /// Creates the fact table of `spec`, and the company and date dimensions it references,
    /// when it does not exist yet.
    ///
    /// Returns whether the fact table was created.
    fn ensure_fact(
        &self,
        layout: &WarehouseLayout,
        spec: &FactSpec,
        dimension: &DimensionSpec,
    ) -> impl Future<Output = DwhResult<bool>> + Send;
}

/// Every capability the pipeline needs from the warehouse.
pub trait Warehouse:
    LineageStore + StagingStore + DimensionStore + DateStore + FactStore + WarehouseAdmin
{
}

impl<T> Warehouse for T where
    T: LineageStore + StagingStore + DimensionStore + DateStore + FactStore + WarehouseAdmin
{
}
