use chrono::NaiveDate;
use dwh::TransferMode;
use dwh::catalog::WarehouseLayout;
use dwh::pipeline::Pipeline;
use dwh::report::OutcomeStatus;
use dwh::store::raw::RawStore;
use dwh::store::raw::memory::MemoryRawStore;
use dwh::store::raw::mysql::MySqlRawStore;
use dwh::store::warehouse::postgres::PostgresWarehouse;
use dwh::test_utils::database::{spawn_raw_database, spawn_warehouse_database};
use dwh::test_utils::fixtures::{company_row, create_raw_tables, date, price_row, timestamp};
use dwh::types::{Cell, Watermark};
use dwh_telemetry::tracing::init_test_tracing;

#[ignore = "needs a Postgres server configured through TESTS_DATABASE_*"]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_warehouse_versions_companies_and_loads_facts() {
    init_test_tracing();
    let database = spawn_warehouse_database().await;
    let layout = WarehouseLayout::default();

    let raw = MemoryRawStore::new();
    create_raw_tables(&raw).await;
    raw.insert_rows(
        "fmp_company_information",
        vec![company_row("AAPL", "Technology", timestamp(2024, 4, 1, 6))],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "raw_yfinance",
        vec![price_row("AAPL", date(2024, 3, 28), 171.48, timestamp(2024, 4, 1, 6))],
    )
    .await
    .unwrap();

    let warehouse = PostgresWarehouse::from_pool(database.pool.clone(), 500);
    let pipeline = Pipeline::new(raw.clone(), warehouse.clone(), layout.clone())
        .with_run_date(date(2024, 4, 2));
    pipeline.prepare().await.unwrap();
    pipeline.prepare().await.unwrap();
    pipeline
        .seed_dates(date(2024, 1, 1), date(2024, 12, 31))
        .await
        .unwrap();

    let report = pipeline.run_all(TransferMode::Incremental).await;
    assert!(!report.has_failures(), "{report:?}");

    raw.insert_rows(
        "fmp_company_information",
        vec![company_row("AAPL", "Consumer Electronics", timestamp(2024, 4, 10, 6))],
    )
    .await
    .unwrap();
    raw.insert_rows(
        "raw_yfinance",
        vec![price_row("AAPL", date(2024, 4, 9), 169.67, timestamp(2024, 4, 10, 6))],
    )
    .await
    .unwrap();
    let later = Pipeline::new(raw, warehouse, layout).with_run_date(date(2024, 4, 10));
    let report = later.run_all(TransferMode::Incremental).await;
    assert!(!report.has_failures(), "{report:?}");
    assert_eq!(
        report.outcome("dim_company_informations").unwrap().status,
        OutcomeStatus::Update
    );
    let prices = report.outcome("fact_history_stock").unwrap();
    assert_eq!(prices.status, OutcomeStatus::Create);
    assert_eq!(prices.rows.inserted, 1);

    let (versions, current): (i64, i64) = sqlx::query_as(
        "select count(*), count(*) filter (where is_current) \
         from dwh.dim_company_informations where symbol = 'AAPL'",
    )
    .fetch_one(&database.pool)
    .await
    .unwrap();
    assert_eq!((versions, current), (2, 1));

    let expired_on: NaiveDate = sqlx::query_scalar(
        "select valid_to_date from dwh.dim_company_informations where not is_current",
    )
    .fetch_one(&database.pool)
    .await
    .unwrap();
    assert_eq!(expired_on, date(2024, 4, 9));

    let closes: Vec<String> =
        sqlx::query_scalar("select close_price::text from dwh.fact_history_stock order by date_key")
            .fetch_all(&database.pool)
            .await
            .unwrap();
    assert_eq!(closes, ["171.4800", "169.6700"]);

    database.drop_database().await;
}

#[ignore = "needs a MySQL server configured through TESTS_MYSQL_*"]
#[tokio::test(flavor = "multi_thread")]
async fn mysql_raw_store_reads_rows_past_the_watermark_in_order() {
    init_test_tracing();
    let database = spawn_raw_database().await;
    sqlx::query(
        "create table raw_yfinance (\
            symbol varchar(16) not null, \
            date date not null, \
            close_price double, \
            volume bigint, \
            load_timestamp datetime(6) not null)",
    )
    .execute(&database.pool)
    .await
    .unwrap();
    sqlx::query(
        "insert into raw_yfinance values \
            ('AAPL', '2024-04-01', 170.03, 46240500, '2024-04-02 06:00:00'), \
            ('AAPL', '2024-03-28', 171.48, 65672700, '2024-03-29 06:00:00'), \
            ('MSFT', '2024-04-01', 424.57, 16316000, '2024-04-02 05:00:00')",
    )
    .execute(&database.pool)
    .await
    .unwrap();
    let raw = MySqlRawStore::from_pool(database.pool.clone());

    let schema = raw.table_schema("raw_yfinance").await.unwrap();
    assert_eq!(schema.len(), 5);
    assert_eq!(raw.read_all("raw_yfinance").await.unwrap().len(), 3);

    let rows = raw
        .read_since(
            "raw_yfinance",
            "load_timestamp",
            Watermark::new(timestamp(2024, 3, 29, 6)),
        )
        .await
        .unwrap();
    let symbols = rows
        .iter()
        .map(|row| row.get(0).clone())
        .collect::<Vec<_>>();
    assert_eq!(symbols, [Cell::from("MSFT"), Cell::from("AAPL")]);

    let err = raw.table_schema("raw_crypto_prices").await.unwrap_err();
    assert_eq!(err.kind(), dwh::error::ErrorKind::SourceTableMissing);

    database.drop_database().await;
}
