use chrono::{NaiveDate, NaiveDateTime};
use dwh_config::shared::{IntoConnectOptions, PgConnectionConfig};
use dwh_postgres::schema::{describe_table, table_exists};
use dwh_postgres::types::{TableName, quote_column};
use pg_escape::quote_identifier;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::columns::{
    COMPANY_KEY, DATE_KEY, DW_LOAD_TIMESTAMP, FULL_DATE, IS_CURRENT, SYMBOL, VALID_TO_DATE,
};
use crate::catalog::{
    DimensionSpec, FactSpec, WarehouseLayout, date_dimension_row, date_dimension_schema,
};
use crate::conversions::postgres::{decode_pg_row, push_cell, typed_select_list};
use crate::bail;
use crate::error::{DwhResult, ErrorKind};
use crate::failpoints::{
    DIMENSION_MERGE__BEFORE_COMMIT, FACT_UPSERT__BEFORE_COMMIT, STAGING_WRITE__BEFORE_COMMIT,
    dwh_fail_point,
};
use crate::store::warehouse::ddl;
use crate::store::warehouse::{
    DateStore, DimensionChanges, DimensionStore, FactBatch, FactStore, LineageStore,
    StagingStore, UpsertCounts, WarehouseAdmin,
};
use crate::types::{
    ColumnSchema, ColumnType, CompanyKey, DateKey, TableRow, TableRows, TableSchema, Watermark,
};

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of bind parameters of one Postgres statement.
const MAX_BIND_PARAMETERS: usize = 65_535;

/// Creates a lazily connected pool; no connection is opened until the first query.
fn create_database_pool(config: &PgConnectionConfig, max_connections: u32) -> PgPool {
    let options = config.with_db();

    PgPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(options)
}

/// Warehouse backed by Postgres, holding both the staging and the dimensional schema.
///
/// Every write runs in its own transaction: a table is either fully written or left as it
/// was.
#[derive(Debug, Clone)]
pub struct PostgresWarehouse {
    pool: PgPool,
    insert_batch_size: usize,
}

impl PostgresWarehouse {
    pub fn new(config: &PgConnectionConfig, max_connections: u32, insert_batch_size: usize) -> Self {
        Self::from_pool(
            create_database_pool(config, max_connections),
            insert_batch_size,
        )
    }

    pub fn from_pool(pool: PgPool, insert_batch_size: usize) -> Self {
        Self {
            pool,
            insert_batch_size: insert_batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Rows per statement, capped so a statement never exceeds the bind parameter limit.
    fn rows_per_statement(&self, columns: usize) -> usize {
        (MAX_BIND_PARAMETERS / columns.max(1))
            .min(self.insert_batch_size)
            .max(1)
    }

    /// Returns the schema of an existing table, or `None` when it does not exist.
    async fn existing_schema(
        connection: &mut PgConnection,
        table: &TableName,
    ) -> DwhResult<Option<TableSchema>> {
        let descriptions = describe_table(&mut *connection, table).await?;
        if descriptions.is_empty() {
            return Ok(None);
        }

        let columns = descriptions
            .into_iter()
            .map(|column| {
                ColumnSchema::new(
                    column.name,
                    ColumnType::from_pg_data_type(&column.data_type),
                    column.nullable,
                )
            })
            .collect();

        Ok(Some(TableSchema::new(columns)))
    }

    /// Inserts `rows` laid out like `columns` with multi-row statements.
    ///
    /// `suffix` is appended to every statement, e.g. an `on conflict` clause.
    async fn insert_rows(
        &self,
        connection: &mut PgConnection,
        table: &TableName,
        columns: &[ColumnSchema],
        rows: Vec<TableRow>,
        suffix: &str,
    ) -> DwhResult<u64> {
        let column_list = columns
            .iter()
            .map(|column| quote_column(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let chunk_size = self.rows_per_statement(columns.len());

        let mut written = 0;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
                "insert into {} ({column_list}) values ",
                table.as_quoted_identifier()
            ));

            for (index, row) in rows.by_ref().take(chunk_size).enumerate() {
                if index > 0 {
                    builder.push(", ");
                }
                builder.push("(");
                let mut separated = builder.separated(", ");
                for (position, column) in columns.iter().enumerate() {
                    push_cell(&mut separated, row.get(position).clone(), &column.typ)?;
                }
                separated.push_unseparated(")");
            }
            builder.push(suffix);

            written += builder.build().execute(&mut *connection).await?.rows_affected();
        }

        Ok(written)
    }

    async fn create_schema(connection: &mut PgConnection, schema: &str) -> DwhResult<()> {
        let statement = format!("create schema if not exists {}", quote_identifier(schema));
        sqlx::query(&statement).execute(&mut *connection).await?;

        Ok(())
    }
}

impl LineageStore for PostgresWarehouse {
    async fn max_lineage(
        &self,
        table: &TableName,
        column: &str,
    ) -> DwhResult<Option<NaiveDateTime>> {
        let mut connection = self.pool.acquire().await?;
        let Some(schema) = Self::existing_schema(&mut connection, table).await? else {
            return Ok(None);
        };
        schema.require(&table.to_string(), column)?;

        let query = format!(
            "select max({})::timestamp from {}",
            quote_column(column),
            table.as_quoted_identifier()
        );
        let max: Option<NaiveDateTime> = sqlx::query_scalar(&query)
            .fetch_one(&mut *connection)
            .await?;

        Ok(max)
    }
}

impl StagingStore for PostgresWarehouse {
    async fn replace_table(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        let mut tx = self.pool.begin().await?;

        Self::create_schema(&mut tx, &table.schema).await?;
        let drop = format!("drop table if exists {}", table.as_quoted_identifier());
        sqlx::query(&drop).execute(&mut *tx).await?;
        sqlx::query(&ddl::staging_table(table, &rows.schema))
            .execute(&mut *tx)
            .await?;

        let written = self
            .insert_rows(&mut tx, table, &rows.schema.columns, rows.rows, "")
            .await?;

        dwh_fail_point(STAGING_WRITE__BEFORE_COMMIT)?;
        tx.commit().await?;
        debug!(%table, rows = written, "replaced staging table");

        Ok(written)
    }

    async fn append_rows(&self, table: &TableName, rows: TableRows) -> DwhResult<u64> {
        let mut tx = self.pool.begin().await?;

        Self::create_schema(&mut tx, &table.schema).await?;
        sqlx::query(&ddl::staging_table(table, &rows.schema))
            .execute(&mut *tx)
            .await?;
        for column in &rows.schema.columns {
            sqlx::query(&ddl::add_staging_column(table, column))
                .execute(&mut *tx)
                .await?;
        }

        // Values are written with the types the staging table already has.
        let Some(existing) = Self::existing_schema(&mut tx, table).await? else {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Staging table disappeared while appending",
                table
            );
        };
        let columns = rows
            .schema
            .columns
            .iter()
            .map(|column| {
                let typ = existing
                    .column(&column.name)
                    .map(|existing| existing.typ)
                    .unwrap_or(column.typ);
                ColumnSchema::new(column.name.clone(), typ, column.nullable)
            })
            .collect::<Vec<_>>();

        let written = self
            .insert_rows(&mut tx, table, &columns, rows.rows, "")
            .await?;

        dwh_fail_point(STAGING_WRITE__BEFORE_COMMIT)?;
        tx.commit().await?;
        debug!(%table, rows = written, "appended to staging table");

        Ok(written)
    }

    async fn read_staged(
        &self,
        table: &TableName,
        lineage_column: &str,
        since: Watermark,
    ) -> DwhResult<Option<TableRows>> {
        let mut connection = self.pool.acquire().await?;
        let Some(schema) = Self::existing_schema(&mut connection, table).await? else {
            return Ok(None);
        };
        schema.require(&table.to_string(), lineage_column)?;

        let lineage_column = quote_column(lineage_column);
        let query = format!(
            "select {} from {} where {lineage_column} > $1 order by {lineage_column}",
            typed_select_list(&schema),
            table.as_quoted_identifier()
        );
        let rows = sqlx::query(&query)
            .bind(since.timestamp())
            .fetch_all(&mut *connection)
            .await?;

        let rows = rows
            .iter()
            .map(|row| decode_pg_row(row, &schema))
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(Some(TableRows::new(schema, rows)))
    }

    async fn read_staged_by_entity(
        &self,
        table: &TableName,
        lineage_column: &str,
        entity_column: &str,
        watermarks: &HashMap<String, NaiveDateTime>,
    ) -> DwhResult<Option<TableRows>> {
        let mut connection = self.pool.acquire().await?;
        let Some(schema) = Self::existing_schema(&mut connection, table).await? else {
            return Ok(None);
        };
        let table_name = table.to_string();
        schema.require(&table_name, lineage_column)?;
        schema.require(&table_name, entity_column)?;

        let (entities, maxima): (Vec<String>, Vec<NaiveDateTime>) = watermarks
            .iter()
            .map(|(entity, max)| (entity.clone(), *max))
            .unzip();
        let lineage_column = quote_column(lineage_column);
        let query = format!(
            "select {} from {} \
             left join unnest($1::text[], $2::timestamp[]) \
                 as entity_watermarks (watermark_entity, watermark_lineage) \
                 on watermark_entity = btrim({}::text) \
             where {lineage_column} > coalesce(watermark_lineage, $3) \
             order by {lineage_column}",
            typed_select_list(&schema),
            table.as_quoted_identifier(),
            quote_column(entity_column)
        );
        let rows = sqlx::query(&query)
            .bind(entities)
            .bind(maxima)
            .bind(Watermark::beginning().timestamp())
            .fetch_all(&mut *connection)
            .await?;

        let rows = rows
            .iter()
            .map(|row| decode_pg_row(row, &schema))
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(Some(TableRows::new(schema, rows)))
    }
}

impl DimensionStore for PostgresWarehouse {
    async fn current_versions(
        &self,
        table: &TableName,
        spec: &DimensionSpec,
    ) -> DwhResult<TableRows> {
        let schema = spec.table_schema();
        let query = format!(
            "select {} from {} where {IS_CURRENT}",
            typed_select_list(&schema),
            table.as_quoted_identifier()
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let rows = rows
            .iter()
            .map(|row| decode_pg_row(row, &schema))
            .collect::<DwhResult<Vec<_>>>()?;

        Ok(TableRows::new(schema, rows))
    }

    async fn apply_versions(&self, table: &TableName, changes: DimensionChanges) -> DwhResult<()> {
        let mut tx = self.pool.begin().await?;

        let expire = format!(
            "update {} set {VALID_TO_DATE} = $1, {IS_CURRENT} = false \
             where {COMPANY_KEY} = $2 and {IS_CURRENT}",
            table.as_quoted_identifier()
        );
        for expiration in &changes.expirations {
            let result = sqlx::query(&expire)
                .bind(expiration.valid_to)
                .bind(expiration.company_key.0)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() != 1 {
                bail!(
                    ErrorKind::InvalidState,
                    "Dimension version to expire is not current",
                    format!("company_key {} in `{table}`", expiration.company_key)
                );
            }
        }

        let DimensionChanges { versions, .. } = changes;
        let inserted = self
            .insert_rows(&mut tx, table, &versions.schema.columns, versions.rows, "")
            .await?;

        dwh_fail_point(DIMENSION_MERGE__BEFORE_COMMIT)?;
        tx.commit().await?;
        debug!(%table, inserted, "applied dimension versions");

        Ok(())
    }

    async fn company_keys(
        &self,
        table: &TableName,
        symbols: &[String],
    ) -> DwhResult<HashMap<String, CompanyKey>> {
        let query = format!(
            "select {SYMBOL}, {COMPANY_KEY} from {} where {IS_CURRENT} and {SYMBOL} = any($1)",
            table.as_quoted_identifier()
        );
        let rows = sqlx::query(&query)
            .bind(symbols)
            .fetch_all(&self.pool)
            .await?;

        let mut keys = HashMap::with_capacity(rows.len());
        for row in rows {
            let symbol: String = row.try_get(0)?;
            let company_key: i64 = row.try_get(1)?;
            keys.insert(symbol, CompanyKey(company_key));
        }

        Ok(keys)
    }
}

impl DateStore for PostgresWarehouse {
    async fn date_keys(
        &self,
        table: &TableName,
        dates: &[NaiveDate],
    ) -> DwhResult<HashMap<NaiveDate, DateKey>> {
        let query = format!(
            "select {FULL_DATE}, {DATE_KEY} from {} where {FULL_DATE} = any($1)",
            table.as_quoted_identifier()
        );
        let rows = sqlx::query(&query)
            .bind(dates)
            .fetch_all(&self.pool)
            .await?;

        let mut keys = HashMap::with_capacity(rows.len());
        for row in rows {
            let date: NaiveDate = row.try_get(0)?;
            let date_key: i32 = row.try_get(1)?;
            keys.insert(date, DateKey(date_key));
        }

        Ok(keys)
    }

    async fn seed_dates(&self, table: &TableName, start: NaiveDate, end: NaiveDate) -> DwhResult<u64> {
        let rows = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(date_dimension_row)
            .collect::<Vec<_>>();
        let schema = date_dimension_schema();

        let mut tx = self.pool.begin().await?;
        let added = self
            .insert_rows(
                &mut tx,
                table,
                &schema.columns,
                rows,
                &format!(" on conflict ({DATE_KEY}) do nothing"),
            )
            .await?;
        tx.commit().await?;
        info!(%table, %start, %end, added, "seeded date dimension");

        Ok(added)
    }
}

impl FactStore for PostgresWarehouse {
    async fn entity_watermarks(
        &self,
        fact: &TableName,
        dimension: &TableName,
        natural_key: &str,
    ) -> DwhResult<HashMap<String, NaiveDateTime>> {
        if !table_exists(&self.pool, fact).await? {
            return Ok(HashMap::new());
        }

        let natural_key = quote_column(natural_key);
        let query = format!(
            "select d.{natural_key}::text, max(f.{DW_LOAD_TIMESTAMP})::timestamp \
             from {} f join {} d on d.{COMPANY_KEY} = f.{COMPANY_KEY} \
             group by d.{natural_key}",
            fact.as_quoted_identifier(),
            dimension.as_quoted_identifier()
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut watermarks = HashMap::with_capacity(rows.len());
        for row in rows {
            let symbol: String = row.try_get(0)?;
            let max: Option<NaiveDateTime> = row.try_get(1)?;
            if let Some(max) = max {
                watermarks.insert(symbol, max);
            }
        }

        Ok(watermarks)
    }

    async fn upsert_facts(&self, fact: &TableName, batch: FactBatch) -> DwhResult<UpsertCounts> {
        if batch.rows.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let columns = &batch.schema.columns;
        let column_list = columns
            .iter()
            .map(|column| quote_column(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict_target = batch
            .natural_key
            .iter()
            .map(|column| quote_column(column))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = columns
            .iter()
            .filter(|column| !batch.natural_key.contains(&column.name.as_str()))
            .map(|column| {
                let name = quote_column(&column.name);
                format!("{name} = excluded.{name}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let chunk_size = self.rows_per_statement(columns.len());

        let mut tx = self.pool.begin().await?;
        let mut counts = UpsertCounts::default();
        let mut rows = batch.rows.into_iter().peekable();
        while rows.peek().is_some() {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
                "insert into {} ({column_list}) values ",
                fact.as_quoted_identifier()
            ));

            for (index, row) in rows.by_ref().take(chunk_size).enumerate() {
                if index > 0 {
                    builder.push(", ");
                }
                builder.push("(");
                let mut separated = builder.separated(", ");
                for (position, column) in columns.iter().enumerate() {
                    push_cell(&mut separated, row.get(position).clone(), &column.typ)?;
                }
                separated.push_unseparated(")");
            }
            builder.push(format!(
                " on conflict ({conflict_target}) do update set {assignments} \
                 returning (xmax = 0) as inserted"
            ));

            let inserted: Vec<bool> = builder
                .build_query_scalar()
                .fetch_all(&mut *tx)
                .await?;
            for was_inserted in inserted {
                if was_inserted {
                    counts.inserted += 1;
                } else {
                    counts.updated += 1;
                }
            }
        }

        dwh_fail_point(FACT_UPSERT__BEFORE_COMMIT)?;
        tx.commit().await?;
        debug!(
            %fact,
            inserted = counts.inserted,
            updated = counts.updated,
            "upserted fact rows"
        );

        Ok(counts)
    }
}

impl WarehouseAdmin for PostgresWarehouse {
    async fn prepare(&self, layout: &WarehouseLayout) -> DwhResult<()> {
        let mut tx = self.pool.begin().await?;
        for statement in ddl::warehouse_ddl(layout) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!(
            staging_schema = %layout.staging_schema,
            warehouse_schema = %layout.warehouse_schema,
            "prepared warehouse schema"
        );

        Ok(())
    }

    async fn ensure_dimension(
        &self,
        layout: &WarehouseLayout,
        spec: &DimensionSpec,
    ) -> DwhResult<bool> {
        let table = layout.dimension_table(spec);

        self.create_missing(&table, ddl::dimension_ddl(layout, spec))
            .await
    }

    async fn ensure_fact(
        &self,
        layout: &WarehouseLayout,
        spec: &FactSpec,
        dimension: &DimensionSpec,
    ) -> DwhResult<bool> {
        let table = layout.fact_table(spec);

        self.create_missing(&table, ddl::fact_ddl(layout, spec, dimension))
            .await
    }
}

impl PostgresWarehouse {
    /// Runs `statements` in one transaction when `table` does not exist.
    async fn create_missing(&self, table: &TableName, statements: Vec<String>) -> DwhResult<bool> {
        if table_exists(&self.pool, table).await? {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        for statement in statements {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!(%table, "created missing warehouse table");

        Ok(true)
    }
}
