//! Copies raw tables into their staging counterparts.

use dwh_config::shared::TransferMode;
use tracing::{debug, info};

use crate::catalog::{StagingSpec, WarehouseLayout};
use crate::error::DwhResult;
use crate::report::{Applied, OutcomeStatus, RowCounts};
use crate::state::table::{TablePhase, TableRun};
use crate::store::raw::RawStore;
use crate::store::warehouse::{LineageStore, StagingStore};
use crate::tracker::get_watermark;

/// Returns the mode actually used for `spec`: tables without a watermark column are
/// always copied in full.
pub fn effective_mode(spec: &StagingSpec, requested: TransferMode) -> TransferMode {
    match spec.watermark_column {
        Some(_) => requested,
        None => TransferMode::Full,
    }
}

/// Copies the raw table of `spec` into staging.
///
/// A full copy replaces the staging table with every source row. An incremental copy
/// appends the source rows newer than the staging watermark. Either way the staging
/// table changes in a single transaction and the source is only read.
pub async fn transfer_table<R, W>(
    raw: &R,
    warehouse: &W,
    layout: &WarehouseLayout,
    spec: &StagingSpec,
    mode: TransferMode,
    run: &mut TableRun,
) -> DwhResult<Applied>
where
    R: RawStore,
    W: LineageStore + StagingStore,
{
    let table = layout.staging_for(spec);
    let mode = effective_mode(spec, mode);

    let applied = match (mode, spec.watermark_column) {
        (TransferMode::Incremental, Some(column)) => {
            run.advance(TablePhase::ReadingWatermark)?;
            let watermark = get_watermark(warehouse, &table, column).await?;

            run.advance(TablePhase::ExtractingDelta)?;
            let rows = raw.read_since(spec.source, column, watermark).await?;
            let read = rows.len() as u64;
            if rows.is_empty() {
                debug!(source = spec.source, %watermark, "no new raw rows");
                run.advance(TablePhase::Committed)?;

                return Ok(Applied::new(OutcomeStatus::Skip, RowCounts::default()));
            }

            run.advance(TablePhase::Upserting)?;
            let inserted = warehouse.append_rows(&table, rows).await?;
            run.advance(TablePhase::Committed)?;

            let status = if watermark.is_beginning() {
                OutcomeStatus::Create
            } else {
                OutcomeStatus::Update
            };
            info!(%table, %mode, %watermark, rows_read = read, "appended raw rows to staging");

            Applied::new(
                status,
                RowCounts {
                    read,
                    inserted,
                    ..RowCounts::default()
                },
            )
        }
        _ => {
            run.advance(TablePhase::ExtractingDelta)?;
            let rows = raw.read_all(spec.source).await?;
            let read = rows.len() as u64;

            run.advance(TablePhase::Upserting)?;
            let inserted = warehouse.replace_table(&table, rows).await?;
            run.advance(TablePhase::Committed)?;
            info!(%table, mode = %TransferMode::Full, rows_read = read, "replaced staging table");

            Applied::new(
                OutcomeStatus::Create,
                RowCounts {
                    read,
                    inserted,
                    ..RowCounts::default()
                },
            )
        }
    };

    Ok(applied)
}
