use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use dwh::TransferMode;
use dwh::catalog::columns::{COMPANY_KEY, DATE_KEY, LOAD_TIMESTAMP, SYMBOL};
use dwh::catalog::{COMPANY_DIMENSION, fact_spec};
use dwh::error::ErrorKind;
use dwh::pipeline::Pipeline;
use dwh::report::{OutcomeStatus, RunReport};
use dwh::state::table::TablePhase;
use dwh::store::raw::memory::MemoryRawStore;
use dwh::store::warehouse::memory::MemoryWarehouse;
use dwh::test_utils::fixtures::{
    company_row, date, earnings_row, income_statement_row, memory_pipeline, pipeline_on,
    price_row, raw_row, rows_where, timestamp, value,
};
use dwh::types::{Cell, TableRows};
use dwh_telemetry::tracing::init_test_tracing;
use std::str::FromStr;

async fn fact_rows(pipeline: &Pipeline<MemoryRawStore, MemoryWarehouse>, name: &str) -> TableRows {
    let spec = fact_spec(name).unwrap();
    let table = pipeline.layout().fact_table(spec);

    pipeline.warehouse().table_rows(&table).await.unwrap()
}

async fn stage_and_transform(pipeline: &Pipeline<MemoryRawStore, MemoryWarehouse>) -> RunReport {
    pipeline.run_all(TransferMode::Incremental).await
}

fn decimal(cell: &Cell) -> BigDecimal {
    cell.to_decimal().unwrap()
}

async fn with_companies(
    run_date: NaiveDate,
    symbols: &[&str],
) -> Pipeline<MemoryRawStore, MemoryWarehouse> {
    let pipeline = memory_pipeline(run_date).await;
    let companies = symbols
        .iter()
        .map(|symbol| company_row(symbol, "Technology", timestamp(2024, 4, 1, 6)))
        .collect();
    pipeline
        .raw()
        .insert_rows("fmp_company_information", companies)
        .await
        .unwrap();

    pipeline
}

#[tokio::test(flavor = "multi_thread")]
async fn restated_figures_overwrite_the_fact_row() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["MSFT"]).await;
    pipeline
        .raw()
        .insert_rows(
            "alphavantage_income_statement",
            vec![income_statement_row(
                "MSFT",
                date(2024, 3, 31),
                "quarterly",
                "21939000000",
                timestamp(2024, 4, 2, 6),
            )],
        )
        .await
        .unwrap();
    let report = stage_and_transform(&pipeline).await;
    assert!(!report.has_failures());
    assert_eq!(
        report.outcome("fact_income_statement").unwrap().status,
        OutcomeStatus::Create
    );

    let later = pipeline_on(&pipeline, date(2024, 5, 2));
    later
        .raw()
        .insert_rows(
            "alphavantage_income_statement",
            vec![income_statement_row(
                "MSFT",
                date(2024, 3, 31),
                "quarterly",
                "22036000000",
                timestamp(2024, 5, 2, 6),
            )],
        )
        .await
        .unwrap();
    let report = stage_and_transform(&later).await;
    let outcome = report.outcome("fact_income_statement").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Update);
    assert_eq!(outcome.rows.updated, 1);

    let rows = fact_rows(&later, "fact_income_statement").await;
    assert_eq!(rows.len(), 1);
    let row = &rows.rows[0];
    assert_eq!(value(&rows, row, "fiscal_date_key"), Cell::I32(20240331));
    assert_eq!(value(&rows, row, "report_type_code"), Cell::from("QUARTER"));
    assert_eq!(
        decimal(&value(&rows, row, "net_income")),
        BigDecimal::from(22_036_000_000_i64)
    );
    assert_eq!(
        value(&rows, row, "dw_load_timestamp"),
        Cell::Timestamp(timestamp(2024, 5, 2, 6))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_of_unknown_companies_are_picked_up_once_the_company_appears() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["AAPL"]).await;
    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![
                price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6)),
                price_row("NVDA", date(2024, 3, 28), 903.56, timestamp(2024, 3, 29, 6)),
            ],
        )
        .await
        .unwrap();

    let report = stage_and_transform(&pipeline).await;
    let outcome = report.outcome("fact_history_stock").unwrap();
    assert!(!outcome.is_error());
    assert_eq!(outcome.rows.inserted, 1);
    assert_eq!(outcome.rows.skipped, 1);
    assert_eq!(fact_rows(&pipeline, "fact_history_stock").await.len(), 1);

    let later = pipeline_on(&pipeline, date(2024, 4, 3));
    later
        .raw()
        .insert_rows(
            "fmp_company_information",
            vec![company_row("NVDA", "Technology", timestamp(2024, 4, 3, 6))],
        )
        .await
        .unwrap();
    let report = stage_and_transform(&later).await;
    let outcome = report.outcome("fact_history_stock").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.inserted, 1);
    assert_eq!(outcome.rows.updated, 0);

    let rows = fact_rows(&later, "fact_history_stock").await;
    assert_eq!(rows.len(), 2);
    let dimension = later
        .warehouse()
        .table_rows(&later.layout().dimension_table(&COMPANY_DIMENSION))
        .await
        .unwrap();
    let nvda = rows_where(&dimension, SYMBOL, &Cell::from("NVDA"));
    let nvda_key = value(&dimension, nvda[0], COMPANY_KEY);
    let nvda_prices = rows_where(&rows, COMPANY_KEY, &nvda_key);
    assert_eq!(nvda_prices.len(), 1);
    assert_eq!(value(&rows, nvda_prices[0], DATE_KEY), Cell::I32(20240328));
}

#[tokio::test(flavor = "multi_thread")]
async fn dates_outside_the_date_dimension_fail_the_whole_table() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["AAPL"]).await;
    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![
                price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6)),
                price_row("AAPL", date(2026, 1, 2), 250.00, timestamp(2024, 3, 29, 7)),
            ],
        )
        .await
        .unwrap();

    let report = stage_and_transform(&pipeline).await;

    let outcome = report.outcome("fact_history_stock").unwrap();
    assert_eq!(outcome.kind, Some(ErrorKind::MissingDateKey));
    assert_eq!(outcome.phase, TablePhase::ResolvingKeys);
    assert!(fact_rows(&pipeline, "fact_history_stock").await.is_empty());
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn earnings_resolve_an_optional_reported_date() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 5, 2), &["AAPL", "MSFT"]).await;
    pipeline
        .raw()
        .insert_rows(
            "alphavantage_earnings",
            vec![
                earnings_row(
                    "AAPL",
                    date(2024, 3, 31),
                    Some(date(2024, 5, 2)),
                    "1.53",
                    timestamp(2024, 5, 2, 6),
                ),
                earnings_row(
                    "MSFT",
                    date(2024, 3, 31),
                    None,
                    "None",
                    timestamp(2024, 5, 2, 6),
                ),
            ],
        )
        .await
        .unwrap();

    let report = stage_and_transform(&pipeline).await;
    assert!(!report.has_failures());

    let rows = fact_rows(&pipeline, "fact_earnings").await;
    assert_eq!(rows.len(), 2);
    let reported_keys = rows
        .iter()
        .map(|row| value(&rows, row, "reported_date_key"))
        .collect::<Vec<_>>();
    assert!(reported_keys.contains(&Cell::I32(20240502)));
    assert!(reported_keys.contains(&Cell::Null));

    let without_figures = rows_where(&rows, "reported_date_key", &Cell::Null);
    assert_eq!(value(&rows, without_figures[0], "reported_eps"), Cell::Null);
    assert_eq!(
        value(&rows, without_figures[0], "reported_time"),
        Cell::from("post-market")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_staged_keys_keep_the_latest_row() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["MSFT"]).await;
    pipeline
        .raw()
        .insert_rows(
            "alphavantage_income_statement",
            vec![
                income_statement_row(
                    "MSFT",
                    date(2023, 12, 31),
                    "annual",
                    "72361000000",
                    timestamp(2024, 4, 2, 7),
                ),
                income_statement_row(
                    "MSFT",
                    date(2023, 12, 31),
                    "annual",
                    "70000000000",
                    timestamp(2024, 4, 2, 6),
                ),
            ],
        )
        .await
        .unwrap();
    // The 2023 fiscal year end predates the seeded range.
    pipeline
        .seed_dates(date(2023, 12, 31), date(2023, 12, 31))
        .await
        .unwrap();

    let report = stage_and_transform(&pipeline).await;
    assert!(!report.has_failures());

    let rows = fact_rows(&pipeline, "fact_income_statement").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        value(&rows, &rows.rows[0], "report_type_code"),
        Cell::from("ANNUAL")
    );
    assert_eq!(
        decimal(&value(&rows, &rows.rows[0], "net_income")),
        BigDecimal::from_str("72361000000").unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_without_category_violate_the_natural_key() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["MSFT"]).await;
    pipeline
        .raw()
        .insert_rows(
            "alphavantage_cash_flow",
            vec![raw_row(
                "alphavantage_cash_flow",
                &[
                    (SYMBOL, Cell::from("MSFT")),
                    ("fiscal_date_ending", Cell::from(date(2024, 3, 31))),
                    ("operating_cashflow", Cell::from("31917000000")),
                    (LOAD_TIMESTAMP, Cell::from(timestamp(2024, 4, 2, 6))),
                ],
            )],
        )
        .await
        .unwrap();

    let report = stage_and_transform(&pipeline).await;

    let outcome = report.outcome("fact_cash_flow").unwrap();
    assert_eq!(outcome.kind, Some(ErrorKind::IntegrityViolation));
    assert!(fact_rows(&pipeline, "fact_cash_flow").await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_twice_changes_nothing() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["AAPL"]).await;
    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![
                price_row("AAPL", date(2024, 3, 27), 173.31, timestamp(2024, 3, 28, 6)),
                price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6)),
            ],
        )
        .await
        .unwrap();
    stage_and_transform(&pipeline).await;
    let first = fact_rows(&pipeline, "fact_history_stock").await;
    assert_eq!(first.len(), 2);

    let report = stage_and_transform(&pipeline).await;

    assert!(
        report
            .outcomes()
            .iter()
            .all(|outcome| outcome.status == OutcomeStatus::Skip),
        "{report:?}"
    );
    assert_eq!(fact_rows(&pipeline, "fact_history_stock").await, first);
}

#[tokio::test(flavor = "multi_thread")]
async fn companies_without_facts_do_not_widen_the_delta() {
    init_test_tracing();
    let pipeline = with_companies(date(2024, 4, 2), &["AAPL", "SPY"]).await;
    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![
                price_row("AAPL", date(2024, 3, 26), 169.71, timestamp(2024, 3, 27, 6)),
                price_row("AAPL", date(2024, 3, 27), 173.31, timestamp(2024, 3, 28, 6)),
            ],
        )
        .await
        .unwrap();
    let report = stage_and_transform(&pipeline).await;
    assert_eq!(report.outcome("fact_history_stock").unwrap().rows.read, 2);

    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6))],
        )
        .await
        .unwrap();
    let report = stage_and_transform(&pipeline).await;

    let outcome = report.outcome("fact_history_stock").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.read, 1);
    assert_eq!(outcome.rows.inserted, 1);
    assert_eq!(fact_rows(&pipeline, "fact_history_stock").await.len(), 3);
}
