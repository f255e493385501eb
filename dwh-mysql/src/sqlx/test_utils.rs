use dwh_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, Executor, MySqlConnection, MySqlPool};

use crate::types::quote_identifier;

/// Creates the database named in `config` and returns a pool connected to it.
///
/// # Panics
/// Panics if the server is unreachable or the database cannot be created.
pub async fn create_mysql_database(config: &MySqlConnectionConfig) -> MySqlPool {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = MySqlConnection::connect_with(&options)
        .await
        .expect("Failed to connect to MySQL");
    connection
        .execute(&*format!(
            "CREATE DATABASE {}",
            quote_identifier(&config.name)
        ))
        .await
        .expect("Failed to create database");

    MySqlPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to MySQL database")
}

/// Drops the database named in `config`, ignoring failures.
pub async fn drop_mysql_database(config: &MySqlConnectionConfig) {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = match MySqlConnection::connect_with(&options).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: failed to connect to MySQL for cleanup: {err}");
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!(
            "DROP DATABASE IF EXISTS {}",
            quote_identifier(&config.name)
        ))
        .await
    {
        eprintln!("warning: failed to drop database {}: {err}", config.name);
    }
}
