use std::process::ExitCode;

use dwh::catalog::WarehouseLayout;
use dwh::pipeline::Pipeline;
use dwh::report::RunReport;
use dwh::store::raw::RawStore;
use dwh::store::raw::mysql::MySqlRawStore;
use dwh::store::warehouse::Warehouse;
use dwh::store::warehouse::postgres::PostgresWarehouse;
use dwh_config::shared::LoaderConfig;
use tracing::{Instrument, info, info_span};

use crate::cli::Command;
use crate::error::LoaderResult;

/// Exit code of a multi-table command where at least one table failed.
const TABLES_FAILED: u8 = 2;

/// Builds the pipeline from `config` and executes `command`.
pub async fn run_command(
    config: LoaderConfig,
    command: Command,
    report_json: bool,
) -> LoaderResult<ExitCode> {
    let max_connections = config.pipeline.max_connections;
    let raw = MySqlRawStore::new(&config.raw, max_connections);
    let warehouse = PostgresWarehouse::new(
        &config.warehouse,
        max_connections,
        config.pipeline.insert_batch_size,
    );
    let pipeline = Pipeline::new(raw, warehouse, WarehouseLayout::from(&config.pipeline));

    info!(
        raw_host = %config.raw.host,
        raw_database = %config.raw.name,
        warehouse_host = %config.warehouse.host,
        warehouse_database = %config.warehouse.name,
        run_date = %pipeline.run_date(),
        "starting dwh loader"
    );

    let span = info_span!("command", command = command_name(&command));
    execute(&pipeline, &config, command, report_json)
        .instrument(span)
        .await
}

async fn execute<R, W>(
    pipeline: &Pipeline<R, W>,
    config: &LoaderConfig,
    command: Command,
    report_json: bool,
) -> LoaderResult<ExitCode>
where
    R: RawStore,
    W: Warehouse,
{
    let mode = command
        .requested_mode()
        .unwrap_or(config.pipeline.transfer_mode);
    let spans_tables = command.spans_tables();

    let report = match command {
        Command::Prepare => {
            pipeline.prepare().await?;
            if let Some(range) = &config.pipeline.date_dimension {
                let seeded = pipeline.seed_dates(range.start, range.end).await?;
                info!(seeded, start = %range.start, end = %range.end, "date dimension seeded");
            }
            info!("warehouse prepared");

            return Ok(ExitCode::SUCCESS);
        }
        Command::SeedDates { start, end } => {
            let seeded = pipeline.seed_dates(start, end).await?;
            info!(seeded, %start, %end, "date dimension seeded");

            return Ok(ExitCode::SUCCESS);
        }
        Command::Transfer { table, .. } => {
            let mut report = RunReport::new();
            report.push(pipeline.transfer(&table, mode).await);
            report
        }
        Command::Merge { table } => {
            let mut report = RunReport::new();
            report.push(pipeline.merge(&table).await);
            report
        }
        Command::Stage { .. } => pipeline.run_staging(mode).await,
        Command::Transform => pipeline.run_transforms().await,
        Command::Run { .. } => pipeline.run_all(mode).await,
    };

    report.log_summary();
    if report_json {
        println!("{}", report.to_json()?);
    }

    Ok(exit_code(&report, spans_tables))
}

/// Maps a report to the process exit code.
///
/// A failed table gives failure for single-table commands and [`TABLES_FAILED`] for
/// commands spanning every table of a stage.
pub fn exit_code(report: &RunReport, spans_tables: bool) -> ExitCode {
    match (report.has_failures(), spans_tables) {
        (false, _) => ExitCode::SUCCESS,
        (true, false) => ExitCode::FAILURE,
        (true, true) => ExitCode::from(TABLES_FAILED),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Prepare => "prepare",
        Command::SeedDates { .. } => "seed-dates",
        Command::Transfer { .. } => "transfer",
        Command::Merge { .. } => "merge",
        Command::Stage { .. } => "stage",
        Command::Transform => "transform",
        Command::Run { .. } => "run",
    }
}
