use chrono::{NaiveDate, Utc};
use dwh_config::shared::TransferMode;
use tracing::{Instrument, info, info_span};

use crate::catalog::{
    COMPANY_DIMENSION, FACT_TABLES, STAGING_TABLES, StagingSpec, WarehouseLayout, fact_spec,
    staging_spec,
};
use crate::dwh_error;
use crate::error::{DwhResult, ErrorKind};
use crate::merge::{merge_dimension, merge_fact};
use crate::report::{Applied, Operation, RunReport, TableOutcome};
use crate::state::table::TableRun;
use crate::store::raw::RawStore;
use crate::store::warehouse::Warehouse;
use crate::transfer::transfer_table;

/// Entry points invoked by the scheduler.
///
/// Tables are processed one after the other. Each table commits or rolls back on its own
/// and a failure is reported in its [`TableOutcome`] without stopping the other tables.
#[derive(Debug)]
pub struct Pipeline<R, W> {
    raw: R,
    warehouse: W,
    layout: WarehouseLayout,
    run_date: NaiveDate,
}

impl<R, W> Pipeline<R, W>
where
    R: RawStore,
    W: Warehouse,
{
    pub fn new(raw: R, warehouse: W, layout: WarehouseLayout) -> Self {
        Self {
            raw,
            warehouse,
            layout,
            run_date: Utc::now().date_naive(),
        }
    }

    /// Sets the date dimension versions are expired relative to.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn layout(&self) -> &WarehouseLayout {
        &self.layout
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// Creates the schemas, dimensions and fact tables that do not exist yet.
    pub async fn prepare(&self) -> DwhResult<()> {
        self.warehouse.prepare(&self.layout).await
    }

    /// Adds the days from `start` to `end` inclusive to the date dimension.
    pub async fn seed_dates(&self, start: NaiveDate, end: NaiveDate) -> DwhResult<u64> {
        if start > end {
            return Err(dwh_error!(
                ErrorKind::InvalidData,
                "Date range is empty",
                format!("start {start} is after end {end}")
            ));
        }

        self.warehouse
            .seed_dates(&self.layout.date_dimension(), start, end)
            .await
    }

    /// Copies the raw table `table` into staging.
    pub async fn transfer(&self, table: &str, mode: TransferMode) -> TableOutcome {
        let Some(spec) = staging_spec(table) else {
            return unknown_table(table, Operation::Transfer);
        };

        self.transfer_spec(spec, mode).await
    }

    async fn transfer_spec(&self, spec: &StagingSpec, mode: TransferMode) -> TableOutcome {
        let mut run = TableRun::new(self.layout.staging_for(spec).name);
        let span = info_span!("transfer", table = spec.source, %mode);

        let result = transfer_table(&self.raw, &self.warehouse, &self.layout, spec, mode, &mut run)
            .instrument(span)
            .await;

        finish(&run, Operation::Transfer, result)
    }

    /// Merges staging into the dimension or fact table named `table`.
    pub async fn merge(&self, table: &str) -> TableOutcome {
        let mut run = TableRun::new(table);
        let span = info_span!("merge", table);

        let result = if table == COMPANY_DIMENSION.name {
            merge_dimension(
                &self.warehouse,
                &self.layout,
                &COMPANY_DIMENSION,
                self.run_date,
                &mut run,
            )
            .instrument(span)
            .await
        } else if let Some(spec) = fact_spec(table) {
            merge_fact(
                &self.warehouse,
                &self.layout,
                spec,
                &COMPANY_DIMENSION,
                &mut run,
            )
            .instrument(span)
            .await
        } else {
            return unknown_table(table, Operation::Merge);
        };

        finish(&run, Operation::Merge, result)
    }

    /// Copies every raw table into staging.
    pub async fn run_staging(&self, mode: TransferMode) -> RunReport {
        info!(%mode, tables = STAGING_TABLES.len(), "staging raw tables");

        let mut report = RunReport::new();
        for spec in STAGING_TABLES {
            report.push(self.transfer_spec(spec, mode).await);
        }

        report
    }

    /// Merges the company dimension, then every fact table.
    ///
    /// Facts run even when the dimension failed: they resolve against whatever current
    /// versions exist and defer the rest.
    pub async fn run_transforms(&self) -> RunReport {
        info!(run_date = %self.run_date, "transforming staging into the warehouse");

        let mut report = RunReport::new();
        report.push(self.merge(COMPANY_DIMENSION.name).await);
        for spec in FACT_TABLES {
            report.push(self.merge(spec.name).await);
        }

        report
    }

    /// Stages every raw table, then runs every transform.
    pub async fn run_all(&self, mode: TransferMode) -> RunReport {
        let mut report = self.run_staging(mode).await;
        report.extend(self.run_transforms().await);

        report
    }
}

fn unknown_table(table: &str, operation: Operation) -> TableOutcome {
    let run = TableRun::new(table);
    let err = dwh_error!(
        ErrorKind::UnknownTable,
        "Table is not part of the catalog",
        table
    );
    let outcome = TableOutcome::failed(&run, operation, &err);
    outcome.log();

    outcome
}

fn finish(
    run: &TableRun,
    operation: Operation,
    result: DwhResult<Applied>,
) -> TableOutcome {
    let outcome = match result {
        Ok(applied) => TableOutcome::succeeded(run, operation, applied.status, applied.rows),
        Err(err) => TableOutcome::failed(run, operation, &err),
    };
    outcome.log();

    outcome
}
