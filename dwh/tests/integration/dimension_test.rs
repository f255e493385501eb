use dwh::TransferMode;
use dwh::catalog::COMPANY_DIMENSION;
use dwh::catalog::columns::{
    COMPANY_KEY, IS_CURRENT, LOAD_TIMESTAMP, SYMBOL, VALID_FROM_DATE, VALID_TO_DATE,
};
use dwh::pipeline::Pipeline;
use dwh::report::OutcomeStatus;
use dwh::store::raw::memory::MemoryRawStore;
use dwh::store::warehouse::memory::MemoryWarehouse;
use dwh::test_utils::fixtures::{
    company_row, date, memory_pipeline, pipeline_on, raw_row, raw_schema, rows_where, timestamp,
    value,
};
use dwh::types::{Cell, TableRows};
use dwh_telemetry::tracing::init_test_tracing;
use std::collections::HashMap;

const COMPANIES: &str = "fmp_company_information";

async fn stage_and_merge(pipeline: &Pipeline<MemoryRawStore, MemoryWarehouse>) -> OutcomeStatus {
    let transfer = pipeline.transfer(COMPANIES, TransferMode::Incremental).await;
    assert!(!transfer.is_error(), "{:?}", transfer.error);

    let merge = pipeline.merge(COMPANY_DIMENSION.name).await;
    assert!(!merge.is_error(), "{:?}", merge.error);

    merge.status
}

async fn dimension_rows(pipeline: &Pipeline<MemoryRawStore, MemoryWarehouse>) -> TableRows {
    let table = pipeline.layout().dimension_table(&COMPANY_DIMENSION);

    pipeline.warehouse().table_rows(&table).await.unwrap()
}

fn assert_one_current_version_per_symbol(rows: &TableRows) {
    let mut current = HashMap::new();
    for row in rows.iter() {
        if value(rows, row, IS_CURRENT) == Cell::Bool(true) {
            *current.entry(value(rows, row, SYMBOL).to_string()).or_insert(0) += 1;
        }
    }
    assert!(current.values().all(|count| *count == 1), "{current:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn new_company_gets_a_current_version() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    pipeline
        .raw()
        .insert_rows(
            COMPANIES,
            vec![company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6))],
        )
        .await
        .unwrap();

    assert_eq!(stage_and_merge(&pipeline).await, OutcomeStatus::Create);

    let rows = dimension_rows(&pipeline).await;
    assert_eq!(rows.len(), 1);
    let row = &rows.rows[0];
    assert_eq!(value(&rows, row, COMPANY_KEY), Cell::I64(1));
    assert_eq!(value(&rows, row, "sector"), Cell::from("Technology"));
    assert_eq!(value(&rows, row, "full_time_employees"), Cell::I64(164_000));
    assert_eq!(value(&rows, row, "is_etf"), Cell::Bool(false));
    assert_eq!(value(&rows, row, IS_CURRENT), Cell::Bool(true));
    assert_eq!(value(&rows, row, VALID_FROM_DATE), Cell::Date(date(2024, 4, 1)));
    assert_eq!(value(&rows, row, VALID_TO_DATE), Cell::Null);
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_tracked_attribute_expires_the_current_version() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    pipeline
        .raw()
        .insert_rows(
            COMPANIES,
            vec![
                company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6)),
                company_row("MSFT", "Technology", timestamp(2024, 4, 1, 6)),
            ],
        )
        .await
        .unwrap();
    stage_and_merge(&pipeline).await;

    let later = pipeline_on(&pipeline, date(2024, 4, 10));
    later
        .raw()
        .insert_rows(
            COMPANIES,
            vec![company_row("AAPL", "Consumer Electronics", timestamp(2024, 4, 10, 6))],
        )
        .await
        .unwrap();
    assert_eq!(stage_and_merge(&later).await, OutcomeStatus::Update);

    let rows = dimension_rows(&later).await;
    assert_eq!(rows.len(), 3);
    assert_one_current_version_per_symbol(&rows);

    let apple = rows_where(&rows, SYMBOL, &Cell::from("AAPL"));
    assert_eq!(apple.len(), 2);
    let (expired, current): (Vec<_>, Vec<_>) = apple
        .into_iter()
        .partition(|row| value(&rows, row, IS_CURRENT) == Cell::Bool(false));

    assert_ne!(
        value(&rows, expired[0], COMPANY_KEY),
        value(&rows, current[0], COMPANY_KEY)
    );
    assert_eq!(value(&rows, expired[0], "sector"), Cell::from("Technology"));
    assert_eq!(value(&rows, expired[0], VALID_TO_DATE), Cell::Date(date(2024, 4, 9)));

    assert_eq!(value(&rows, current[0], COMPANY_KEY), Cell::I64(3));
    assert_eq!(value(&rows, current[0], "sector"), Cell::from("Consumer Electronics"));
    assert_eq!(value(&rows, current[0], VALID_FROM_DATE), Cell::Date(date(2024, 4, 10)));
    assert_eq!(value(&rows, current[0], VALID_TO_DATE), Cell::Null);

    let microsoft = rows_where(&rows, SYMBOL, &Cell::from("MSFT"));
    assert_eq!(microsoft.len(), 1);
    assert_eq!(value(&rows, microsoft[0], IS_CURRENT), Cell::Bool(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn unchanged_and_passthrough_only_changes_keep_the_version() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    pipeline
        .raw()
        .insert_rows(
            COMPANIES,
            vec![company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6))],
        )
        .await
        .unwrap();
    stage_and_merge(&pipeline).await;

    let mut restaged = company_row("AAPL", "Technology", timestamp(2024, 4, 2, 6));
    let schema = raw_schema(COMPANIES);
    restaged.set(schema.index_of("is_etf").unwrap(), Cell::from("true"));
    pipeline
        .raw()
        .insert_rows(COMPANIES, vec![restaged])
        .await
        .unwrap();

    assert_eq!(stage_and_merge(&pipeline).await, OutcomeStatus::Skip);
    let rows = dimension_rows(&pipeline).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(value(&rows, &rows.rows[0], "is_etf"), Cell::Bool(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_twice_changes_nothing() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    pipeline
        .raw()
        .insert_rows(
            COMPANIES,
            vec![
                company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6)),
                company_row("AAPL", "Consumer Electronics", timestamp(2024, 4, 1, 7)),
            ],
        )
        .await
        .unwrap();

    assert_eq!(stage_and_merge(&pipeline).await, OutcomeStatus::Create);
    let first = dimension_rows(&pipeline).await;
    assert_eq!(first.len(), 1);
    assert_eq!(
        value(&first, &first.rows[0], "sector"),
        Cell::from("Consumer Electronics")
    );

    let again = pipeline.merge(COMPANY_DIMENSION.name).await;
    assert_eq!(again.status, OutcomeStatus::Skip);
    assert_eq!(dimension_rows(&pipeline).await, first);
}

#[tokio::test(flavor = "multi_thread")]
async fn staged_rows_without_symbol_are_skipped() {
    init_test_tracing();
    let pipeline = memory_pipeline(date(2024, 4, 2)).await;
    pipeline
        .raw()
        .insert_rows(
            COMPANIES,
            vec![
                company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6)),
                raw_row(
                    COMPANIES,
                    &[
                        ("sector", Cell::from("Energy")),
                        (LOAD_TIMESTAMP, Cell::from(timestamp(2024, 4, 1, 6))),
                    ],
                ),
            ],
        )
        .await
        .unwrap();
    pipeline.transfer(COMPANIES, TransferMode::Incremental).await;

    let outcome = pipeline.merge(COMPANY_DIMENSION.name).await;

    assert_eq!(outcome.status, OutcomeStatus::Create);
    assert_eq!(outcome.rows.read, 2);
    assert_eq!(outcome.rows.inserted, 1);
    assert_eq!(outcome.rows.skipped, 1);
    assert_eq!(dimension_rows(&pipeline).await.len(), 1);
}
