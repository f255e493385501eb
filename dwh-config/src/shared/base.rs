use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    #[error("`max_connections` cannot be zero")]
    MaxConnectionsZero,
    #[error("`insert_batch_size` cannot be zero")]
    InsertBatchSizeZero,
    #[error("`{0}` is not a valid schema name")]
    InvalidSchemaName(String),
    #[error("`staging_schema` and `warehouse_schema` must differ, both are `{0}`")]
    SchemasCollide(String),
    #[error("date dimension range is empty: `{start}` is after `{end}`")]
    EmptyDateRange { start: String, end: String },
}
