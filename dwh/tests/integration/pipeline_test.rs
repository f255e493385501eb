use dwh::TransferMode;
use dwh::catalog::{COMPANY_DIMENSION, WarehouseLayout, fact_spec};
use dwh::error::ErrorKind;
use dwh::pipeline::Pipeline;
use dwh::report::OutcomeStatus;
use dwh::store::raw::memory::MemoryRawStore;
use dwh::store::warehouse::memory::MemoryWarehouse;
use dwh::test_utils::faulty::FaultyWarehouse;
use dwh::test_utils::fixtures::{
    company_row, create_raw_tables, date, earnings_row, income_statement_row, market_cap_row,
    memory_pipeline, price_row, timestamp,
};
use dwh_telemetry::tracing::init_test_tracing;

async fn seed_raw_tables(raw: &MemoryRawStore) {
    let loaded = timestamp(2024, 5, 2, 6);
    raw.insert_rows(
        "fmp_company_information",
        vec![
            company_row("AAPL", "Technology", loaded),
            company_row("MSFT", "Technology", loaded),
        ],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "raw_yfinance",
        vec![
            price_row("AAPL", date(2024, 5, 1), 169.30, loaded),
            price_row("MSFT", date(2024, 5, 1), 394.94, loaded),
        ],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "fmp_company_market_cap",
        vec![market_cap_row("AAPL", date(2024, 5, 1), 2.61e12, loaded)],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "alphavantage_income_statement",
        vec![income_statement_row(
            "MSFT",
            date(2024, 3, 31),
            "quarterly",
            "21939000000",
            loaded,
        )],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "alphavantage_earnings",
        vec![earnings_row(
            "AAPL",
            date(2024, 3, 31),
            Some(date(2024, 5, 2)),
            "1.53",
            loaded,
        )],
    )
    .await
    .unwrap();
}

async fn faulty_pipeline() -> Pipeline<MemoryRawStore, FaultyWarehouse<MemoryWarehouse>> {
    let raw = MemoryRawStore::new();
    create_raw_tables(&raw).await;
    seed_raw_tables(&raw).await;

    let pipeline = Pipeline::new(
        raw,
        FaultyWarehouse::wrap(MemoryWarehouse::new()),
        WarehouseLayout::default(),
    )
    .with_run_date(date(2024, 5, 3));
    pipeline.prepare().await.unwrap();
    pipeline
        .seed_dates(date(2024, 1, 1), date(2024, 12, 31))
        .await
        .unwrap();

    pipeline
}

#[tokio::test(flavor = "multi_thread")]
async fn run_all_stages_then_transforms_every_table() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 5, 3)).await;
    seed_raw_tables(pipeline.raw()).await;

    let report = pipeline.run_all(TransferMode::Incremental).await;

    assert!(!report.has_failures(), "{report:?}");
    let tables = report
        .outcomes()
        .iter()
        .map(|outcome| outcome.table.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        tables,
        [
            "stg_raw_yfinance",
            "stg_fmp_company_market_cap",
            "stg_fmp_company_information",
            "stg_alphavantage_cash_flow",
            "stg_alphavantage_income_statement",
            "stg_alphavantage_balance_sheet",
            "stg_alphavantage_earnings",
            "dim_company_informations",
            "fact_history_stock",
            "fact_market_cap",
            "fact_cash_flow",
            "fact_income_statement",
            "fact_balance_sheet",
            "fact_earnings",
        ]
    );
    let status = |table: &str| report.outcome(table).unwrap().status;
    assert_eq!(status("stg_raw_yfinance"), OutcomeStatus::Create);
    assert_eq!(status("stg_alphavantage_cash_flow"), OutcomeStatus::Skip);
    assert_eq!(status("dim_company_informations"), OutcomeStatus::Create);
    assert_eq!(status("fact_history_stock"), OutcomeStatus::Create);
    assert_eq!(status("fact_cash_flow"), OutcomeStatus::Skip);
    assert_eq!(report.outcome("fact_history_stock").unwrap().rows.inserted, 2);

    let json = report.to_json().unwrap();
    assert!(json.contains(r#""status": "CREATE""#));
    assert!(json.contains(r#""status": "SKIP""#));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_table_does_not_stop_the_others() {
    init_test_tracing();
    let pipeline = faulty_pipeline().await;
    pipeline
        .warehouse()
        .fail_writes("fact_market_cap", ErrorKind::DestinationConnectionFailed)
        .await;

    let report = pipeline.run_all(TransferMode::Incremental).await;

    let failures = report.failures().collect::<Vec<_>>();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].table, "fact_market_cap");
    assert!(failures[0].is_retryable());
    assert_eq!(
        report.outcome("fact_history_stock").unwrap().status,
        OutcomeStatus::Create
    );
    assert_eq!(
        report.outcome("fact_earnings").unwrap().status,
        OutcomeStatus::Create
    );

    let market_cap = pipeline
        .layout()
        .fact_table(fact_spec("fact_market_cap").unwrap());
    let inner = pipeline.warehouse().inner();
    assert!(inner.table_rows(&market_cap).await.unwrap().is_empty());

    pipeline.warehouse().heal("fact_market_cap").await;
    let report = pipeline.run_transforms().await;
    assert!(!report.has_failures());
    let outcome = report.outcome("fact_market_cap").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.inserted, 1);
    assert_eq!(
        report.outcome("fact_history_stock").unwrap().status,
        OutcomeStatus::Skip
    );
    assert_eq!(inner.table_rows(&market_cap).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn facts_still_run_when_the_dimension_fails() {
    init_test_tracing();
    let pipeline = faulty_pipeline().await;
    pipeline
        .warehouse()
        .fail_writes(COMPANY_DIMENSION.name, ErrorKind::DestinationQueryFailed)
        .await;

    let report = pipeline.run_all(TransferMode::Incremental).await;

    let dimension = report.outcome(COMPANY_DIMENSION.name).unwrap();
    assert_eq!(dimension.kind, Some(ErrorKind::DestinationQueryFailed));
    let prices = report.outcome("fact_history_stock").unwrap();
    assert!(!prices.is_error());
    assert_eq!(prices.rows.skipped, 2);
    assert_eq!(prices.status, OutcomeStatus::Skip);

    pipeline.warehouse().heal(COMPANY_DIMENSION.name).await;
    let report = pipeline.run_transforms().await;
    assert!(!report.has_failures());
    assert_eq!(
        report.outcome("fact_history_stock").unwrap().rows.inserted,
        2
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_transform_targets_are_rejected() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 5, 3)).await;

    let outcome = pipeline.merge("fact_dividends").await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(outcome.kind, Some(ErrorKind::UnknownTable));
}

#[tokio::test(flavor = "multi_thread")]
async fn seeding_dates_is_idempotent() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 5, 3)).await;

    let added = pipeline
        .seed_dates(date(2023, 12, 25), date(2024, 1, 5))
        .await
        .unwrap();
    assert_eq!(added, 7);
    let added = pipeline
        .seed_dates(date(2023, 12, 25), date(2024, 1, 5))
        .await
        .unwrap();
    assert_eq!(added, 0);

    let err = pipeline
        .seed_dates(date(2024, 2, 1), date(2024, 1, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_merges_create_missing_warehouse_tables() {
    init_test_tracing();
    let raw = MemoryRawStore::new();
    create_raw_tables(&raw).await;
    seed_raw_tables(&raw).await;
    let layout = WarehouseLayout::default();
    let pipeline = Pipeline::new(raw, MemoryWarehouse::new(), layout.clone())
        .with_run_date(date(2024, 5, 3));

    for table in ["raw_yfinance", "fmp_company_information"] {
        let transfer = pipeline.transfer(table, TransferMode::Incremental).await;
        assert_eq!(transfer.status, OutcomeStatus::Create, "{:?}", transfer.error);
    }

    let prices = pipeline.merge("fact_history_stock").await;
    assert_eq!(prices.status, OutcomeStatus::Skip, "{:?}", prices.error);
    assert_eq!(prices.rows.skipped, 2);
    let date_table = layout.date_dimension();
    assert!(pipeline.warehouse().table_rows(&date_table).await.is_some());

    let companies = pipeline.merge(COMPANY_DIMENSION.name).await;
    assert_eq!(companies.status, OutcomeStatus::Create, "{:?}", companies.error);
    assert_eq!(companies.rows.inserted, 2);

    pipeline
        .seed_dates(date(2024, 5, 1), date(2024, 5, 3))
        .await
        .unwrap();
    let prices = pipeline.merge("fact_history_stock").await;
    assert_eq!(prices.status, OutcomeStatus::Create, "{:?}", prices.error);
    assert_eq!(prices.rows.inserted, 2);
}
