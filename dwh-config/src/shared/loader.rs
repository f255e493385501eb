use serde::Deserialize;

use crate::Config;
use crate::shared::{MySqlConnectionConfig, PgConnectionConfig, PipelineConfig, ValidationError};

/// Complete configuration of the `dwh-loader` binary.
///
/// Does not implement [`serde::Serialize`] so the connection secrets cannot leak into
/// serialized output.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Raw store written by the extractors.
    pub raw: MySqlConnectionConfig,
    /// Warehouse holding the staging and dimensional schemas.
    pub warehouse: PgConnectionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.raw.tls.validate()?;
        self.warehouse.tls.validate()?;
        self.pipeline.validate()
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
