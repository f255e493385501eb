use dwh::TransferMode;
use dwh::catalog::WarehouseLayout;
use dwh::error::ErrorKind;
use dwh::pipeline::Pipeline;
use dwh::report::OutcomeStatus;
use dwh::store::raw::RawStore;
use dwh::store::raw::memory::MemoryRawStore;
use dwh::store::warehouse::WarehouseAdmin;
use dwh::store::warehouse::memory::MemoryWarehouse;
use dwh::test_utils::fixtures::{date, memory_pipeline, price_row, raw_schema, timestamp};
use dwh_telemetry::tracing::init_test_tracing;

const PRICES: &str = "raw_yfinance";

#[tokio::test(flavor = "multi_thread")]
async fn incremental_transfer_appends_only_rows_past_the_watermark() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    let staging = pipeline.layout().staging_table(PRICES);

    pipeline
        .raw()
        .insert_rows(
            PRICES,
            vec![
                price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6)),
                price_row("MSFT", date(2024, 3, 28), 420.72, timestamp(2024, 3, 29, 6)),
            ],
        )
        .await
        .unwrap();

    let first = pipeline.transfer(PRICES, TransferMode::Incremental).await;
    assert_eq!(first.status, OutcomeStatus::Create);
    assert_eq!(first.table, "stg_raw_yfinance");
    assert_eq!(first.rows.inserted, 2);

    pipeline
        .raw()
        .insert_rows(
            PRICES,
            vec![price_row("AAPL", date(2024, 4, 1), 170.03, timestamp(2024, 4, 2, 6))],
        )
        .await
        .unwrap();

    let second = pipeline.transfer(PRICES, TransferMode::Incremental).await;
    assert_eq!(second.status, OutcomeStatus::Update);
    assert_eq!(second.rows.read, 1);
    assert_eq!(second.rows.inserted, 1);

    let third = pipeline.transfer(PRICES, TransferMode::Incremental).await;
    assert_eq!(third.status, OutcomeStatus::Skip);
    assert_eq!(third.rows.inserted, 0);

    let staged = pipeline.warehouse().table_rows(&staging).await.unwrap();
    assert_eq!(staged.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_transfer_replaces_staging_and_leaves_raw_untouched() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    let staging = pipeline.layout().staging_table(PRICES);

    pipeline
        .raw()
        .insert_rows(
            PRICES,
            vec![price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6))],
        )
        .await
        .unwrap();
    pipeline.transfer(PRICES, TransferMode::Incremental).await;
    pipeline.transfer(PRICES, TransferMode::Full).await;
    let staged = pipeline.warehouse().table_rows(&staging).await.unwrap();
    assert_eq!(staged.len(), 1);

    pipeline
        .raw()
        .insert_rows(
            PRICES,
            vec![price_row("AAPL", date(2024, 4, 1), 170.03, timestamp(2024, 4, 2, 6))],
        )
        .await
        .unwrap();
    let outcome = pipeline.transfer(PRICES, TransferMode::Full).await;
    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.inserted, 2);

    let staged = pipeline.warehouse().table_rows(&staging).await.unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(pipeline.raw().read_all(PRICES).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_raw_tables_fail_only_themselves() {
    init_test_tracing();
    let raw = MemoryRawStore::new();
    raw.create_table(PRICES, raw_schema(PRICES)).await;
    raw.insert_rows(
        PRICES,
        vec![price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 3, 29, 6))],
    )
    .await
    .unwrap();
    let warehouse = MemoryWarehouse::new();
    warehouse.prepare(&WarehouseLayout::default()).await.unwrap();
    let pipeline = Pipeline::new(raw, warehouse, WarehouseLayout::default());

    let report = pipeline.run_staging(TransferMode::Incremental).await;

    assert_eq!(report.outcomes().len(), 7);
    let prices = report.outcome("stg_raw_yfinance").unwrap();
    assert_eq!(prices.status, OutcomeStatus::Create);
    assert_eq!(report.failures().count(), 6);
    assert!(
        report
            .failures()
            .all(|outcome| outcome.kind == Some(ErrorKind::SourceTableMissing))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_raw_tables_are_rejected() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;

    let outcome = pipeline
        .transfer("raw_crypto_prices", TransferMode::Incremental)
        .await;

    assert!(outcome.is_error());
    assert_eq!(outcome.kind, Some(ErrorKind::UnknownTable));
    assert!(!outcome.is_retryable());
}
