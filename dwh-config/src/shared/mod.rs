//! Configuration types shared by the loader and the engine.

mod base;
mod connection;
mod loader;
mod pipeline;

pub use base::ValidationError;
pub use connection::{
    IntoConnectOptions, MySqlConnectionConfig, PgConnectionConfig, TlsConfig,
    WAREHOUSE_SESSION_OPTIONS, WarehouseSessionOptions,
};
pub use loader::LoaderConfig;
pub use pipeline::{DateDimensionConfig, PipelineConfig, TransferMode};
