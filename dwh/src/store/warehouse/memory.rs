use chrono::{NaiveDate, NaiveDateTime};
use dwh_postgres::types::TableName;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::columns::{
    COMPANY_KEY, DATE_KEY, DW_LOAD_TIMESTAMP, FULL_DATE, IS_CURRENT, SYMBOL, VALID_TO_DATE,
};
use crate::catalog::{
    COMPANY_DIMENSION, DimensionSpec, FACT_TABLES, FactSpec, WarehouseLayout,
    date_dimension_row, date_dimension_schema,
};
use crate::conversions::coerce::coerce_row;
use crate::error::{DwhError, DwhResult, ErrorKind};
use crate::failpoints::{
    DIMENSION_MERGE__BEFORE_COMMIT, FACT_UPSERT__BEFORE_COMMIT, STAGING_WRITE__BEFORE_COMMIT,
    dwh_fail_point,
};
use crate::store::warehouse::{
    DateStore, DimensionChanges, DimensionStore, FactBatch, FactStore, LineageStore,
    StagingStore, UpsertCounts, WarehouseAdmin,
};
use crate::types::{Cell, CompanyKey, DateKey, TableRow, TableRows, TableSchema, Watermark};
use crate::{bail, dwh_error};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<TableRow>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    fn require(&self, table: &TableName, column: &str) -> DwhResult<usize> {
        self.schema.require(&table.to_string(), column)
    }

    /// Maps rows of another layout onto this table's columns by name, converting values to
    /// the column types.
    fn align(&self, rows: TableRows) -> DwhResult<Vec<TableRow>> {
        let positions = self
            .schema
            .columns
            .iter()
            .map(|column| rows.schema.index_of(&column.name))
            .collect::<Vec<_>>();
        let types = self
            .schema
            .columns
            .iter()
            .map(|column| column.typ)
            .collect::<Vec<_>>();

        rows.rows
            .into_iter()
            .map(|row| {
                let values = positions
                    .iter()
                    .map(|position| match position {
                        Some(index) => row.get(*index).clone(),
                        None => Cell::Null,
                    })
                    .collect();

                Ok(TableRow::new(coerce_row(values, &types)?))
            })
            .collect()
    }

    /// Fails like a `NOT NULL` constraint would.
    fn check_not_null(&self, table: &TableName) -> DwhResult<()> {
        for (index, column) in self.schema.columns.iter().enumerate() {
            if column.nullable {
                continue;
            }

            if self.rows.iter().any(|row| row.get(index).is_null()) {
                bail!(
                    ErrorKind::IntegrityViolation,
                    "Database constraint violated",
                    format!("null value in column `{}` of `{table}`", column.name)
                );
            }
        }

        Ok(())
    }

    fn is_current(&self, row: &TableRow, is_current: usize) -> bool {
        matches!(row.get(is_current), Cell::Bool(true))
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, MemoryTable>,
    last_company_key: i64,
}

impl Inner {
    /// Adds an empty `table` unless it exists. Returns whether it was added.
    fn create_table(&mut self, table: TableName, schema: TableSchema) -> bool {
        if self.tables.contains_key(&table) {
            return false;
        }
        self.tables.insert(table, MemoryTable::new(schema));

        true
    }
}

/// Warehouse keeping every table in memory.
///
/// Each write builds the new table contents on a copy and swaps it in at the end, so a
/// failed write leaves the table untouched like a rolled back transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the contents of `table`.
    pub async fn table_rows(&self, table: &TableName) -> Option<TableRows> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .get(table)
            .map(|table| TableRows::new(table.schema.clone(), table.rows.clone()))
    }

    /// Drops `table` if it exists.
    pub async fn drop_table(&self, table: &TableName) {
        let mut inner = self.inner.lock().await;
        inner.tables.remove(table);
    }
}

fn missing_table(table: &TableName) -> DwhError {
    dwh_error!(
        ErrorKind::DestinationTableMissing,
        "Table does not exist",
        table
    )
}

/// Key used to match rows on a set of columns.
fn row_key(row: &TableRow, positions: &[usize]) -> Vec<String> {
    positions
        .iter()
        .map(|position| row.get(*position).to_string())
        .collect()
}

impl LineageStore for MemoryWarehouse {
    async fn max_lineage(
        &self,
        table: &TableName,
        column: &str,
    ) -> DwhResult<Option<NaiveDateTime>> {
        let inner = self.inner.lock().await;
        let Some(state) = inner.tables.get(table) else {
            return Ok(None);
        };

        let index = state.require(table, column)?;
        let mut max = None;
        for row in &state.rows {
            let lineage = row.get(index).to_timestamp()?;
            max = max.max(lineage);
        }

        Ok(max)
    }
}

impl StagingStore for MemoryWarehouse {
    async fn replace_table(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        let mut inner = self.inner.lock().await;

        let mut state = MemoryTable::new(rows.schema.clone());
        let count = rows.len() as u64;
        state.rows = state.align(rows)?;

        dwh_fail_point(STAGING_WRITE__BEFORE_COMMIT)?;
        inner.tables.insert(table.clone(), state);

        Ok(count)
    }

    async fn append_rows(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        let mut inner = self.inner.lock().await;

        let mut state = inner
            .tables
            .get(table)
            .cloned()
            .unwrap_or_else(|| MemoryTable::new(rows.schema.clone()));
        for column in &rows.schema.columns {
            if state.schema.index_of(&column.name).is_none() {
                state.schema.columns.push(column.clone());
            }
        }

        let width = state.schema.len();
        for row in &mut state.rows {
            if row.values().len() < width {
                row.set(width - 1, Cell::Null);
            }
        }

        let count = rows.len() as u64;
        let aligned = state.align(rows)?;
        state.rows.extend(aligned);

        dwh_fail_point(STAGING_WRITE__BEFORE_COMMIT)?;
        inner.tables.insert(table.clone(), state);

        Ok(count)
    }

    async fn read_staged(
        &self,
        table: &TableName,
        lineage_column: &str,
        since: Watermark,
    ) -> DwhResult<Option<TableRows>> {
        let inner = self.inner.lock().await;
        let Some(state) = inner.tables.get(table) else {
            return Ok(None);
        };

        let index = state.require(table, lineage_column)?;
        let mut selected = Vec::new();
        for row in &state.rows {
            if let Some(lineage) = row.get(index).to_timestamp()?
                && since.admits(lineage)
            {
                selected.push((lineage, row.clone()));
            }
        }
        selected.sort_by_key(|(lineage, _)| *lineage);

        Ok(Some(TableRows::new(
            state.schema.clone(),
            selected.into_iter().map(|(_, row)| row).collect(),
        )))
    }

    async fn read_staged_by_entity(
        &self,
        table: &TableName,
        lineage_column: &str,
        entity_column: &str,
        watermarks: &HashMap<String, NaiveDateTime>,
    ) -> DwhResult<Option<TableRows>> {
        let inner = self.inner.lock().await;
        let Some(state) = inner.tables.get(table) else {
            return Ok(None);
        };

        let lineage_index = state.require(table, lineage_column)?;
        let entity_index = state.require(table, entity_column)?;
        let mut selected = Vec::new();
        for row in &state.rows {
            let since = match row.get(entity_index) {
                Cell::Null => None,
                entity => watermarks.get(entity.to_string().trim()).copied(),
            };
            if let Some(lineage) = row.get(lineage_index).to_timestamp()?
                && Watermark::from_max(since).admits(lineage)
            {
                selected.push((lineage, row.clone()));
            }
        }
        selected.sort_by_key(|(lineage, _)| *lineage);

        Ok(Some(TableRows::new(
            state.schema.clone(),
            selected.into_iter().map(|(_, row)| row).collect(),
        )))
    }
}

impl DimensionStore for MemoryWarehouse {
    async fn current_versions(
        &self,
        table: &TableName,
        spec: &DimensionSpec,
    ) -> DwhResult<TableRows> {
        let inner = self.inner.lock().await;
        let state = inner.tables.get(table).ok_or_else(|| missing_table(table))?;

        let is_current = state.require(table, IS_CURRENT)?;
        let current = state
            .rows
            .iter()
            .filter(|row| state.is_current(row, is_current))
            .cloned()
            .collect();

        let schema = spec.table_schema();
        let view = MemoryTable::new(schema.clone());
        let rows = view.align(TableRows::new(state.schema.clone(), current))?;

        Ok(TableRows::new(schema, rows))
    }

    async fn apply_versions(&self, table: &TableName, changes: DimensionChanges) -> DwhResult<()> {
        let mut inner = self.inner.lock().await;
        let mut state = inner
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| missing_table(table))?;

        let key = state.require(table, COMPANY_KEY)?;
        let natural_key = state.require(table, SYMBOL)?;
        let valid_to = state.require(table, VALID_TO_DATE)?;
        let is_current = state.require(table, IS_CURRENT)?;

        for expiration in &changes.expirations {
            let company_key = Cell::I64(expiration.company_key.0);
            let Some(row) = state.rows.iter_mut().find(|row| {
                !row.get(key).is_distinct_from(&company_key)
                    && matches!(row.get(is_current), Cell::Bool(true))
            }) else {
                bail!(
                    ErrorKind::InvalidState,
                    "Dimension version to expire is not current",
                    format!("company_key {} in `{table}`", expiration.company_key)
                );
            };

            row.set(valid_to, Cell::Date(expiration.valid_to));
            row.set(is_current, Cell::Bool(false));
        }

        let mut last_company_key = inner.last_company_key;
        for mut row in state.align(changes.versions)? {
            last_company_key += 1;
            row.set(key, Cell::I64(last_company_key));
            state.rows.push(row);
        }

        let mut current_symbols = HashSet::new();
        for row in &state.rows {
            if state.is_current(row, is_current) {
                let symbol = row.get(natural_key).to_string();
                if !current_symbols.insert(symbol.clone()) {
                    bail!(
                        ErrorKind::IntegrityViolation,
                        "Database constraint violated",
                        format!("more than one current version of `{symbol}` in `{table}`")
                    );
                }
            }
        }
        state.check_not_null(table)?;

        dwh_fail_point(DIMENSION_MERGE__BEFORE_COMMIT)?;
        inner.last_company_key = last_company_key;
        inner.tables.insert(table.clone(), state);

        Ok(())
    }

    async fn company_keys(
        &self,
        table: &TableName,
        symbols: &[String],
    ) -> DwhResult<HashMap<String, CompanyKey>> {
        let inner = self.inner.lock().await;
        let state = inner.tables.get(table).ok_or_else(|| missing_table(table))?;

        let key = state.require(table, COMPANY_KEY)?;
        let natural_key = state.require(table, SYMBOL)?;
        let is_current = state.require(table, IS_CURRENT)?;
        let wanted = symbols.iter().map(String::as_str).collect::<HashSet<_>>();

        let mut keys = HashMap::new();
        for row in &state.rows {
            if !state.is_current(row, is_current) {
                continue;
            }

            if let (Cell::String(symbol), Cell::I64(company_key)) =
                (row.get(natural_key), row.get(key))
                && wanted.contains(symbol.as_str())
            {
                keys.insert(symbol.clone(), CompanyKey(*company_key));
            }
        }

        Ok(keys)
    }
}

impl DateStore for MemoryWarehouse {
    async fn date_keys(
        &self,
        table: &TableName,
        dates: &[NaiveDate],
    ) -> DwhResult<HashMap<NaiveDate, DateKey>> {
        let inner = self.inner.lock().await;
        let state = inner.tables.get(table).ok_or_else(|| missing_table(table))?;

        let key = state.require(table, DATE_KEY)?;
        let full_date = state.require(table, FULL_DATE)?;
        let wanted = dates.iter().collect::<HashSet<_>>();

        let mut keys = HashMap::new();
        for row in &state.rows {
            if let (Cell::Date(date), Cell::I32(date_key)) = (row.get(full_date), row.get(key))
                && wanted.contains(date)
            {
                keys.insert(*date, DateKey(*date_key));
            }
        }

        Ok(keys)
    }

    async fn seed_dates(&self, table: &TableName, start: NaiveDate, end: NaiveDate) -> DwhResult<u64> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| missing_table(table))?;

        let key = state.require(table, DATE_KEY)?;
        let mut existing = state
            .rows
            .iter()
            .map(|row| row.get(key).clone())
            .filter_map(|cell| match cell {
                Cell::I32(value) => Some(value),
                _ => None,
            })
            .collect::<HashSet<_>>();

        let mut added = 0;
        for date in start.iter_days().take_while(|date| *date <= end) {
            if existing.insert(DateKey::for_date(date).0) {
                state.rows.push(date_dimension_row(date));
                added += 1;
            }
        }

        Ok(added)
    }
}

impl FactStore for MemoryWarehouse {
    async fn entity_watermarks(
        &self,
        fact: &TableName,
        dimension: &TableName,
        natural_key: &str,
    ) -> DwhResult<HashMap<String, NaiveDateTime>> {
        let inner = self.inner.lock().await;
        let Some(facts) = inner.tables.get(fact) else {
            return Ok(HashMap::new());
        };
        let versions = inner
            .tables
            .get(dimension)
            .ok_or_else(|| missing_table(dimension))?;

        let version_key = versions.require(dimension, COMPANY_KEY)?;
        let version_symbol = versions.require(dimension, natural_key)?;
        let symbols = versions
            .rows
            .iter()
            .map(|row| (row.get(version_key).to_string(), row.get(version_symbol).to_string()))
            .collect::<HashMap<_, _>>();

        let fact_key = facts.require(fact, COMPANY_KEY)?;
        let lineage = facts.require(fact, DW_LOAD_TIMESTAMP)?;

        let mut watermarks: HashMap<String, NaiveDateTime> = HashMap::new();
        for row in &facts.rows {
            let Some(symbol) = symbols.get(&row.get(fact_key).to_string()) else {
                continue;
            };
            let Some(timestamp) = row.get(lineage).to_timestamp()? else {
                continue;
            };

            watermarks
                .entry(symbol.clone())
                .and_modify(|max| *max = (*max).max(timestamp))
                .or_insert(timestamp);
        }

        Ok(watermarks)
    }

    async fn upsert_facts(&self, fact: &TableName, batch: FactBatch) -> DwhResult<UpsertCounts> {
        let mut inner = self.inner.lock().await;
        let mut state = inner
            .tables
            .get(fact)
            .cloned()
            .ok_or_else(|| missing_table(fact))?;

        let positions = batch
            .natural_key
            .iter()
            .map(|column| state.require(fact, column))
            .collect::<DwhResult<Vec<_>>>()?;

        let mut existing = state
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row_key(row, &positions), index))
            .collect::<HashMap<_, _>>();

        let mut counts = UpsertCounts::default();
        let mut seen = HashSet::new();
        for row in state.align(TableRows::new(batch.schema, batch.rows))? {
            let key = row_key(&row, &positions);
            if !seen.insert(key.clone()) {
                bail!(
                    ErrorKind::IntegrityViolation,
                    "Batch upserts the same natural key twice",
                    format!("{} in `{fact}`", key.join(", "))
                );
            }

            match existing.get(&key) {
                Some(index) => {
                    state.rows[*index] = row;
                    counts.updated += 1;
                }
                None => {
                    existing.insert(key, state.rows.len());
                    state.rows.push(row);
                    counts.inserted += 1;
                }
            }
        }
        state.check_not_null(fact)?;

        dwh_fail_point(FACT_UPSERT__BEFORE_COMMIT)?;
        inner.tables.insert(fact.clone(), state);

        Ok(counts)
    }
}

impl WarehouseAdmin for MemoryWarehouse {
    async fn prepare(&self, layout: &WarehouseLayout) -> DwhResult<()> {
        let mut inner = self.inner.lock().await;

        let mut tables = vec![
            (layout.date_dimension(), date_dimension_schema()),
            (
                layout.dimension_table(&COMPANY_DIMENSION),
                COMPANY_DIMENSION.table_schema(),
            ),
        ];
        tables.extend(
            FACT_TABLES
                .iter()
                .map(|spec| (layout.fact_table(spec), spec.table_schema())),
        );

        for (table, schema) in tables {
            inner.create_table(table, schema);
        }

        Ok(())
    }

    async fn ensure_dimension(
        &self,
        layout: &WarehouseLayout,
        spec: &DimensionSpec,
    ) -> DwhResult<bool> {
        let mut inner = self.inner.lock().await;

        Ok(inner.create_table(layout.dimension_table(spec), spec.table_schema()))
    }

    async fn ensure_fact(
        &self,
        layout: &WarehouseLayout,
        spec: &FactSpec,
        dimension: &DimensionSpec,
    ) -> DwhResult<bool> {
        let mut inner = self.inner.lock().await;

        inner.create_table(layout.dimension_table(dimension), dimension.table_schema());
        inner.create_table(layout.date_dimension(), date_dimension_schema());

        Ok(inner.create_table(layout.fact_table(spec), spec.table_schema()))
    }
}
