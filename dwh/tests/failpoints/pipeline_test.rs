use dwh::TransferMode;
use dwh::catalog::{COMPANY_DIMENSION, fact_spec};
use dwh::error::ErrorKind;
use dwh::failpoints::{
    DIMENSION_MERGE__BEFORE_COMMIT, FACT_UPSERT__BEFORE_COMMIT, STAGING_WRITE__BEFORE_COMMIT,
};
use dwh::report::OutcomeStatus;
use dwh::state::table::TablePhase;
use dwh::test_utils::failpoints::FailpointScenario;
use dwh::test_utils::fixtures::{
    company_row, date, income_statement_row, memory_pipeline, price_row, timestamp,
};
use dwh_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn staging_write_failure_leaves_staging_untouched() {
    init_test_tracing();
    let mut scenario = FailpointScenario::start();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    let staging = pipeline.layout().staging_table("raw_yfinance");
    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6))],
        )
        .await
        .unwrap();
    pipeline
        .transfer("raw_yfinance", TransferMode::Incremental)
        .await;
    let before = pipeline.warehouse().table_rows(&staging).await.unwrap();

    pipeline
        .raw()
        .insert_rows(
            "raw_yfinance",
            vec![price_row("AAPL", date(2024, 4, 1), 170.03, timestamp(2024, 4, 2, 6))],
        )
        .await
        .unwrap();
    scenario.arm(STAGING_WRITE__BEFORE_COMMIT, "return");
    let incremental = pipeline
        .transfer("raw_yfinance", TransferMode::Incremental)
        .await;
    assert_eq!(incremental.kind, Some(ErrorKind::FailpointTriggered));
    assert_eq!(incremental.phase, TablePhase::Upserting);

    let full = pipeline.transfer("raw_yfinance", TransferMode::Full).await;
    assert_eq!(full.kind, Some(ErrorKind::FailpointTriggered));
    assert_eq!(pipeline.warehouse().table_rows(&staging).await.unwrap(), before);
    scenario.disarm();

    let retried = pipeline
        .transfer("raw_yfinance", TransferMode::Incremental)
        .await;
    assert_eq!(retried.status, OutcomeStatus::Update);
    assert_eq!(retried.rows.inserted, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn dimension_failure_rolls_back_expirations_and_versions() {
    init_test_tracing();
    let mut scenario = FailpointScenario::start();
    let pipeline = memory_pipeline(date(2024, 4, 10)).await;
    let dimension = pipeline.layout().dimension_table(&COMPANY_DIMENSION);
    pipeline
        .raw()
        .insert_rows(
            COMPANY_DIMENSION.source,
            vec![company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6))],
        )
        .await
        .unwrap();
    pipeline.run_all(TransferMode::Incremental).await;
    let before = pipeline.warehouse().table_rows(&dimension).await.unwrap();

    pipeline
        .raw()
        .insert_rows(
            COMPANY_DIMENSION.source,
            vec![
                company_row("AAPL", "Consumer Electronics", timestamp(2024, 4, 10, 6)),
                company_row("MSFT", "Technology", timestamp(2024, 4, 10, 6)),
            ],
        )
        .await
        .unwrap();
    pipeline
        .transfer(COMPANY_DIMENSION.source, TransferMode::Incremental)
        .await;
    scenario.arm(DIMENSION_MERGE__BEFORE_COMMIT, "return(connection)");
    let outcome = pipeline.merge(COMPANY_DIMENSION.name).await;
    assert_eq!(outcome.kind, Some(ErrorKind::DestinationConnectionFailed));
    assert!(outcome.is_retryable());
    assert_eq!(pipeline.warehouse().table_rows(&dimension).await.unwrap(), before);
    scenario.disarm();

    let retried = pipeline.merge(COMPANY_DIMENSION.name).await;
    assert_eq!(retried.status, OutcomeStatus::Update);
    assert_eq!(retried.rows.inserted, 1);
    assert_eq!(retried.rows.updated, 1);
    assert_eq!(pipeline.warehouse().table_rows(&dimension).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn fact_failure_leaves_the_watermark_where_it_was() {
    init_test_tracing();
    let mut scenario = FailpointScenario::start();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    let fact = pipeline
        .layout()
        .fact_table(fact_spec("fact_income_statement").unwrap());
    pipeline
        .raw()
        .insert_rows(
            COMPANY_DIMENSION.source,
            vec![company_row("MSFT", "Technology", timestamp(2024, 4, 1, 6))],
        )
        .await
        .unwrap();
    pipeline
        .raw()
        .insert_rows(
            "alphavantage_income_statement",
            vec![
                income_statement_row(
                    "MSFT",
                    date(2024, 3, 31),
                    "quarterly",
                    "21939000000",
                    timestamp(2024, 4, 2, 6),
                ),
                income_statement_row(
                    "MSFT",
                    date(2023, 12, 31),
                    "quarterly",
                    "21870000000",
                    timestamp(2024, 4, 2, 6),
                ),
            ],
        )
        .await
        .unwrap();
    pipeline
        .seed_dates(date(2023, 12, 31), date(2023, 12, 31))
        .await
        .unwrap();
    scenario.arm(FACT_UPSERT__BEFORE_COMMIT, "return(integrity)");
    let report = pipeline.run_all(TransferMode::Incremental).await;
    let outcome = report.outcome("fact_income_statement").unwrap();
    assert_eq!(outcome.kind, Some(ErrorKind::IntegrityViolation));
    assert!(pipeline.warehouse().table_rows(&fact).await.unwrap().is_empty());
    scenario.disarm();

    let report = pipeline.run_transforms().await;
    let outcome = report.outcome("fact_income_statement").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.inserted, 2);
    assert_eq!(pipeline.warehouse().table_rows(&fact).await.unwrap().len(), 2);
}
