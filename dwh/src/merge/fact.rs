use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::bail;
use crate::catalog::columns::LOAD_TIMESTAMP;
use crate::catalog::{DimensionSpec, FactSpec, WarehouseLayout};
use crate::conversions::coerce::coerce;
use crate::error::{DwhResult, ErrorKind};
use crate::merge::keys::KeyResolver;
use crate::report::{Applied, RowCounts};
use crate::state::table::{TablePhase, TableRun};
use crate::store::warehouse::{
    DateStore, DimensionStore, FactBatch, FactStore, StagingStore, WarehouseAdmin,
};
use crate::types::{Cell, ColumnType, TableRow, TableSchema};

/// Positions of the staging columns a fact reads.
#[derive(Debug)]
struct StagedColumns {
    entity: usize,
    lineage: usize,
    dates: Vec<usize>,
    category: Option<usize>,
    /// Attributes then measures, with the type they are stored as. Columns missing from
    /// staging are written as null.
    values: Vec<(Option<usize>, ColumnType)>,
}

impl StagedColumns {
    fn locate(spec: &FactSpec, schema: &TableSchema, table: &str) -> DwhResult<Self> {
        let dates = spec
            .date_keys
            .iter()
            .map(|date_key| schema.require(table, date_key.source_column))
            .collect::<DwhResult<Vec<_>>>()?;
        let category = spec
            .category
            .map(|category| schema.require(table, category.source_column))
            .transpose()?;
        let values = spec
            .attributes
            .iter()
            .chain(spec.measures)
            .map(|attribute| (schema.index_of(attribute.name), attribute.typ))
            .collect();

        Ok(Self {
            entity: schema.require(table, spec.entity_column)?,
            lineage: schema.require(table, LOAD_TIMESTAMP)?,
            dates,
            category,
            values,
        })
    }
}

/// Staged row past the watermark of its company.
#[derive(Debug)]
struct StagedFact {
    symbol: String,
    lineage: NaiveDateTime,
    /// One entry per date key of the fact, `None` for a null source date.
    dates: Vec<Option<NaiveDate>>,
    row: TableRow,
}

fn entity_symbol(cell: &Cell) -> Option<String> {
    let symbol = match cell {
        Cell::Null => return None,
        Cell::String(symbol) => symbol.trim().to_string(),
        other => other.to_string(),
    };

    (!symbol.is_empty()).then_some(symbol)
}

/// Builds the fact row of `staged` laid out like [`FactSpec::table_schema`].
///
/// Returns `None` when the company has no current dimension version.
fn build_fact_row(
    spec: &FactSpec,
    columns: &StagedColumns,
    resolver: &KeyResolver,
    staged: &StagedFact,
    table: &str,
) -> DwhResult<Option<TableRow>> {
    let Some(company_key) = resolver.resolve_company_key(&staged.symbol) else {
        return Ok(None);
    };

    let mut values = Vec::with_capacity(columns.values.len() + spec.date_keys.len() + 3);
    values.push(Cell::I64(company_key.0));
    for date in &staged.dates {
        let key = match date {
            Some(date) => Cell::I32(resolver.require_date_key(*date, table)?.0),
            None => Cell::Null,
        };
        values.push(key);
    }

    if let (Some(category), Some(position)) = (spec.category, columns.category) {
        let code = match staged.row.get(position) {
            Cell::Null => None,
            Cell::String(value) if value.trim().is_empty() => None,
            value => Some(category.code(&value.to_string())),
        };
        let Some(code) = code else {
            bail!(
                ErrorKind::IntegrityViolation,
                "Fact row has no category",
                format!(
                    "`{}` is null for `{}` in `{table}`",
                    category.source_column, staged.symbol
                )
            );
        };
        values.push(Cell::String(code));
    }

    for (position, typ) in &columns.values {
        let value = match position {
            Some(position) => coerce(staged.row.get(*position).clone(), typ)?,
            None => Cell::Null,
        };
        values.push(value);
    }
    values.push(Cell::Timestamp(staged.lineage));

    Ok(Some(TableRow::new(values)))
}

/// Merges staged rows into the fact table of `spec`.
///
/// Each company is read from its own watermark, the greatest lineage of its fact rows,
/// so rows skipped while the company was missing from `dimension` are picked up once it
/// appears. Rows sharing a natural key collapse to the one with the greatest lineage,
/// and the batch is upserted in one transaction.
pub async fn merge_fact<W>(
    warehouse: &W,
    layout: &WarehouseLayout,
    spec: &FactSpec,
    dimension: &DimensionSpec,
    run: &mut TableRun,
) -> DwhResult<Applied>
where
    W: StagingStore + DimensionStore + DateStore + FactStore + WarehouseAdmin,
{
    let table = layout.fact_table(spec);
    let table_name = table.to_string();
    let dimension_table = layout.dimension_table(dimension);
    let staging = layout.staging_table(spec.source);

    run.advance(TablePhase::ReadingWatermark)?;
    if warehouse.ensure_fact(layout, spec, dimension).await? {
        info!(%table, "created missing fact table, loading it from the beginning");
    }
    let watermarks = warehouse
        .entity_watermarks(&table, &dimension_table, dimension.natural_key)
        .await?;
    debug!(%table, companies = watermarks.len(), "read fact watermarks");

    run.advance(TablePhase::ExtractingDelta)?;
    let staged = warehouse
        .read_staged_by_entity(&staging, LOAD_TIMESTAMP, spec.entity_column, &watermarks)
        .await?;
    let Some(staged) = staged else {
        warn!(%staging, "staging table does not exist, nothing to merge");
        run.advance(TablePhase::Committed)?;

        return Ok(Applied::merged(RowCounts::default()));
    };
    let columns = StagedColumns::locate(spec, &staged.schema, &staging.to_string())?;

    let mut rows = RowCounts::default();
    let mut delta = Vec::new();
    for row in staged.rows {
        let Some(symbol) = entity_symbol(row.get(columns.entity)) else {
            rows.skipped += 1;
            continue;
        };
        let Some(lineage) = row.get(columns.lineage).to_timestamp()? else {
            rows.skipped += 1;
            continue;
        };

        let mut dates = Vec::with_capacity(columns.dates.len());
        for (date_key, position) in spec.date_keys.iter().zip(&columns.dates) {
            let date = row.get(*position).to_date()?;
            if date.is_none() && date_key.required {
                bail!(
                    ErrorKind::InvalidData,
                    "Fact row has no date",
                    format!(
                        "`{}` is null for `{symbol}` in `{staging}`",
                        date_key.source_column
                    )
                );
            }
            dates.push(date);
        }

        delta.push(StagedFact {
            symbol,
            lineage,
            dates,
            row,
        });
    }
    rows.read = delta.len() as u64 + rows.skipped;

    run.advance(TablePhase::ResolvingKeys)?;
    let symbols = delta
        .iter()
        .map(|fact| fact.symbol.clone())
        .collect::<BTreeSet<_>>();
    let dates = delta
        .iter()
        .flat_map(|fact| fact.dates.iter().flatten().copied())
        .collect::<BTreeSet<_>>();
    let resolver = KeyResolver::load(
        warehouse,
        &dimension_table,
        &layout.date_dimension(),
        symbols,
        dates,
    )
    .await?;

    let schema = spec.table_schema();
    let natural_key = spec.natural_key();
    let key_positions = natural_key
        .iter()
        .map(|column| schema.require(&table_name, column))
        .collect::<DwhResult<Vec<_>>>()?;

    let mut missing_companies = BTreeSet::new();
    let mut batch: Vec<(NaiveDateTime, TableRow)> = Vec::new();
    let mut positions: HashMap<Vec<String>, usize> = HashMap::new();
    for staged in &delta {
        let Some(row) = build_fact_row(spec, &columns, &resolver, staged, &table_name)? else {
            rows.skipped += 1;
            missing_companies.insert(staged.symbol.as_str());
            continue;
        };

        let key = key_positions
            .iter()
            .map(|position| row.get(*position).to_string())
            .collect::<Vec<_>>();
        match positions.get(&key) {
            // Ties go to the row staged last.
            Some(index) if batch[*index].0 <= staged.lineage => {
                batch[*index] = (staged.lineage, row);
            }
            Some(_) => {}
            None => {
                positions.insert(key, batch.len());
                batch.push((staged.lineage, row));
            }
        }
    }

    if !missing_companies.is_empty() {
        warn!(
            %table,
            symbols = ?missing_companies,
            rows_skipped = rows.skipped,
            "skipped rows of companies without a current dimension version"
        );
    }

    if !batch.is_empty() {
        run.advance(TablePhase::Upserting)?;
        let counts = warehouse
            .upsert_facts(
                &table,
                FactBatch {
                    schema,
                    natural_key,
                    rows: batch.into_iter().map(|(_, row)| row).collect(),
                },
            )
            .await?;
        rows.inserted = counts.inserted;
        rows.updated = counts.updated;
    }
    run.advance(TablePhase::Committed)?;
    info!(
        %table,
        rows_read = rows.read,
        rows_inserted = rows.inserted,
        rows_updated = rows.updated,
        rows_skipped = rows.skipped,
        "merged fact table"
    );

    Ok(Applied::merged(rows))
}
