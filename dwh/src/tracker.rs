//! High-water marks of incremental loads.

use dwh_postgres::types::TableName;
use tracing::debug;

use crate::error::DwhResult;
use crate::store::warehouse::LineageStore;
use crate::types::Watermark;

/// Returns the watermark of `table`: the maximum of its lineage `column`, or
/// [`Watermark::beginning`] when the table is empty or does not exist yet.
///
/// The destination is the only record of progress. A run that rolls back leaves the
/// maximum where it was, so the next run reads the same rows again.
pub async fn get_watermark<S>(store: &S, table: &TableName, column: &str) -> DwhResult<Watermark>
where
    S: LineageStore,
{
    let max = store.max_lineage(table, column).await?;
    let watermark = Watermark::from_max(max);
    debug!(%table, column, %watermark, "read watermark");

    Ok(watermark)
}
