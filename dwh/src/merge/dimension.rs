use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::catalog::columns::{COMPANY_KEY, DW_LOAD_TIMESTAMP, LOAD_TIMESTAMP};
use crate::catalog::{DimensionSpec, WarehouseLayout};
use crate::conversions::coerce::coerce;
use crate::bail;
use crate::error::{DwhResult, ErrorKind};
use crate::report::{Applied, RowCounts};
use crate::state::table::{TablePhase, TableRun};
use crate::store::warehouse::{
    DimensionChanges, DimensionStore, Expiration, LineageStore, StagingStore, WarehouseAdmin,
};
use crate::tracker::get_watermark;
use crate::types::{Cell, CompanyKey, TableRow, TableRows, TableSchema};

/// Latest staged state of one natural key.
#[derive(Debug, Clone)]
struct StagedVersion {
    symbol: String,
    lineage: NaiveDateTime,
    /// Values of every dimension attribute, converted to the attribute types.
    attributes: Vec<Cell>,
}

/// Returns the `valid_to_date` closing a version superseded by one valid from
/// `valid_from`: the day before the run, never on or after the new version's first day.
pub fn expiration_date(run_date: NaiveDate, valid_from: NaiveDate) -> NaiveDate {
    let yesterday = run_date - Days::new(1);
    let before_successor = valid_from - Days::new(1);

    yesterday.min(before_successor)
}

/// Keeps the most recent staged row of every natural key.
///
/// Rows arrive in lineage order, so a later row of the same key replaces an earlier one.
/// Rows without a natural key are counted and dropped.
fn latest_per_key(
    spec: &DimensionSpec,
    staged: TableRows,
    table: &str,
) -> DwhResult<(Vec<StagedVersion>, u64)> {
    let natural_key = staged.schema.require(table, spec.natural_key)?;
    let lineage_position = staged.schema.require(table, LOAD_TIMESTAMP)?;
    let positions = spec
        .attributes()
        .map(|attribute| (staged.schema.index_of(attribute.name), attribute.typ))
        .collect::<Vec<_>>();

    let mut order = Vec::new();
    let mut latest: HashMap<String, StagedVersion> = HashMap::new();
    let mut dropped = 0;
    for row in staged.rows {
        let symbol = match row.get(natural_key) {
            Cell::Null => None,
            Cell::String(symbol) => Some(symbol.trim().to_string()),
            other => Some(other.to_string()),
        };
        let lineage = row.get(lineage_position).to_timestamp()?;
        let (Some(symbol), Some(lineage)) = (symbol, lineage) else {
            dropped += 1;
            continue;
        };
        if symbol.is_empty() {
            dropped += 1;
            continue;
        }

        let attributes = positions
            .iter()
            .map(|(position, typ)| match position {
                Some(position) => coerce(row.get(*position).clone(), typ),
                None => Ok(Cell::Null),
            })
            .collect::<DwhResult<Vec<_>>>()?;

        if !latest.contains_key(&symbol) {
            order.push(symbol.clone());
        }
        latest.insert(
            symbol.clone(),
            StagedVersion {
                symbol,
                lineage,
                attributes,
            },
        );
    }

    let versions = order
        .into_iter()
        .filter_map(|symbol| latest.remove(&symbol))
        .collect();

    Ok((versions, dropped))
}

/// Column layout of the versions handed to the store: the dimension without its
/// surrogate key.
fn version_schema(spec: &DimensionSpec) -> TableSchema {
    let mut schema = spec.table_schema();
    schema.columns.retain(|column| column.name != COMPANY_KEY);

    schema
}

fn version_row(staged: StagedVersion) -> TableRow {
    let mut values = Vec::with_capacity(staged.attributes.len() + 5);
    values.push(Cell::String(staged.symbol));
    values.extend(staged.attributes);
    values.extend([
        Cell::Date(staged.lineage.date()),
        Cell::Null,
        Cell::Bool(true),
        Cell::Timestamp(staged.lineage),
    ]);

    TableRow::new(values)
}

/// Merges staged rows into the SCD type 2 dimension of `spec`.
///
/// Only staged rows newer than the dimension's own lineage maximum are considered, and of
/// those only the latest per natural key. A key without a current version gets one. A key
/// whose tracked attributes differ from the current version, nulls compared as equal to
/// each other, has that version closed and a new one opened. Both happen in one
/// transaction, so re-running without new staged rows changes nothing.
pub async fn merge_dimension<W>(
    warehouse: &W,
    layout: &WarehouseLayout,
    spec: &DimensionSpec,
    run_date: NaiveDate,
    run: &mut TableRun,
) -> DwhResult<Applied>
where
    W: LineageStore + StagingStore + DimensionStore + WarehouseAdmin,
{
    let table = layout.dimension_table(spec);
    let staging = layout.staging_table(spec.source);

    run.advance(TablePhase::ReadingWatermark)?;
    if warehouse.ensure_dimension(layout, spec).await? {
        info!(%table, "created missing dimension, loading it from the beginning");
    }
    let watermark = get_watermark(warehouse, &table, DW_LOAD_TIMESTAMP).await?;

    run.advance(TablePhase::ExtractingDelta)?;
    let Some(staged) = warehouse
        .read_staged(&staging, LOAD_TIMESTAMP, watermark)
        .await?
    else {
        warn!(%staging, "staging table does not exist, nothing to merge");
        run.advance(TablePhase::Committed)?;

        return Ok(Applied::merged(RowCounts::default()));
    };
    let read = staged.len() as u64;
    let (latest, dropped) = latest_per_key(spec, staged, &staging.to_string())?;
    if dropped > 0 {
        warn!(%staging, rows = dropped, "dropped staged rows without natural key or lineage");
    }

    run.advance(TablePhase::ResolvingKeys)?;
    let current = warehouse.current_versions(&table, spec).await?;
    let key_position = current.schema.require(&table.to_string(), COMPANY_KEY)?;
    let symbol_position = current.schema.require(&table.to_string(), spec.natural_key)?;
    let tracked_positions = spec
        .tracked
        .iter()
        .map(|attribute| current.schema.require(&table.to_string(), attribute.name))
        .collect::<DwhResult<Vec<_>>>()?;

    let current_by_symbol = current
        .rows
        .iter()
        .filter_map(|row| {
            row.get(symbol_position)
                .as_str()
                .map(|symbol| (symbol.to_string(), row))
        })
        .collect::<HashMap<_, _>>();

    let mut expirations = Vec::new();
    let mut versions = Vec::new();
    let mut rows = RowCounts {
        read,
        skipped: dropped,
        ..RowCounts::default()
    };
    for staged in latest {
        match current_by_symbol.get(&staged.symbol) {
            None => {
                debug!(symbol = %staged.symbol, "new dimension key");
                rows.inserted += 1;
                versions.push(version_row(staged));
            }
            Some(current) => {
                // Tracked attributes come first in the staged attribute values.
                let changed = tracked_positions
                    .iter()
                    .zip(&staged.attributes)
                    .any(|(position, value)| current.get(*position).is_distinct_from(value));
                if !changed {
                    continue;
                }

                let Cell::I64(company_key) = current.get(key_position) else {
                    bail!(
                        ErrorKind::InvalidData,
                        "Dimension version has no surrogate key",
                        format!("symbol `{}` in `{table}`", staged.symbol)
                    );
                };
                let valid_from = staged.lineage.date();
                debug!(symbol = %staged.symbol, company_key, "tracked attributes changed");

                expirations.push(Expiration {
                    company_key: CompanyKey(*company_key),
                    valid_to: expiration_date(run_date, valid_from),
                });
                rows.updated += 1;
                versions.push(version_row(staged));
            }
        }
    }

    let changes = DimensionChanges {
        expirations,
        versions: TableRows::new(version_schema(spec), versions),
    };
    if !changes.is_empty() {
        run.advance(TablePhase::Upserting)?;
        warehouse.apply_versions(&table, changes).await?;
    }
    run.advance(TablePhase::Committed)?;
    info!(
        %table,
        %watermark,
        rows_read = rows.read,
        rows_inserted = rows.inserted,
        rows_updated = rows.updated,
        "merged dimension"
    );

    Ok(Applied::merged(rows))
}
