use std::future::Future;

use crate::error::DwhResult;
use crate::types::{TableRows, TableSchema, Watermark};

/// Read-only view over the raw tables populated by the extractors.
///
/// Implementations never modify the source. Reading a table that does not exist fails with
/// [`crate::error::ErrorKind::SourceTableMissing`].
pub trait RawStore {
    /// Returns the column layout of `table`.
    fn table_schema(&self, table: &str) -> impl Future<Output = DwhResult<TableSchema>> + Send;

    /// Returns every row of `table`.
    fn read_all(&self, table: &str) -> impl Future<Output = DwhResult<TableRows>> + Send;

    /// Returns the rows of `table` whose `column` is strictly newer than `watermark`, in
    /// ascending `column` order.
    fn read_since(
        &self,
        table: &str,
        column: &str,
        watermark: Watermark,
    ) -> impl Future<Output = DwhResult<TableRows>> + Send;
}
