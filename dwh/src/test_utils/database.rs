use dwh_config::shared::{MySqlConnectionConfig, PgConnectionConfig, TlsConfig};
use dwh_mysql::sqlx::test_utils::{create_mysql_database, drop_mysql_database};
use dwh_postgres::sqlx::test_utils::{create_pg_database, drop_pg_database};
use sqlx::{MySqlPool, PgPool};
use uuid::Uuid;

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

fn port_var(name: &str) -> u16 {
    required_var(name)
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid port number"))
}

/// Connection settings of a throwaway warehouse database with a unique name.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: required_var("TESTS_DATABASE_HOST"),
        port: port_var("TESTS_DATABASE_PORT"),
        name: Uuid::new_v4().to_string(),
        username: required_var("TESTS_DATABASE_USERNAME"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
    }
}

/// Connection settings of a throwaway raw database with a unique name, read from the
/// `TESTS_MYSQL_HOST`, `TESTS_MYSQL_PORT`, `TESTS_MYSQL_USERNAME` and optional
/// `TESTS_MYSQL_PASSWORD` variables.
pub fn local_mysql_connection_config() -> MySqlConnectionConfig {
    MySqlConnectionConfig {
        host: required_var("TESTS_MYSQL_HOST"),
        port: port_var("TESTS_MYSQL_PORT"),
        name: format!("raw_{}", Uuid::new_v4().simple()),
        username: required_var("TESTS_MYSQL_USERNAME"),
        password: std::env::var("TESTS_MYSQL_PASSWORD").ok().map(Into::into),
        tls: TlsConfig::disabled(),
    }
}

/// Warehouse database living until [`PgTestDatabase::drop_database`] is awaited.
pub struct PgTestDatabase {
    pub config: PgConnectionConfig,
    pub pool: PgPool,
}

impl PgTestDatabase {
    pub async fn drop_database(self) {
        self.pool.close().await;
        drop_pg_database(&self.config).await;
    }
}

/// Raw database living until [`MySqlTestDatabase::drop_database`] is awaited.
pub struct MySqlTestDatabase {
    pub config: MySqlConnectionConfig,
    pub pool: MySqlPool,
}

impl MySqlTestDatabase {
    pub async fn drop_database(self) {
        self.pool.close().await;
        drop_mysql_database(&self.config).await;
    }
}

/// Creates an empty warehouse database.
///
/// # Panics
/// Panics if the server is unreachable or the database cannot be created.
pub async fn spawn_warehouse_database() -> PgTestDatabase {
    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;

    PgTestDatabase { config, pool }
}

/// Creates an empty raw database.
///
/// # Panics
/// Panics if the server is unreachable or the database cannot be created.
pub async fn spawn_raw_database() -> MySqlTestDatabase {
    let config = local_mysql_connection_config();
    let pool = create_mysql_database(&config).await;

    MySqlTestDatabase { config, pool }
}
