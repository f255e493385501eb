use dwh_config::shared::PipelineConfig;
use dwh_postgres::types::TableName;

use crate::catalog::{DATE_DIMENSION, DimensionSpec, FactSpec, StagingSpec};

/// Resolves catalog entries to schema-qualified warehouse tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseLayout {
    pub staging_schema: String,
    pub warehouse_schema: String,
}

impl WarehouseLayout {
    pub fn new(staging_schema: impl Into<String>, warehouse_schema: impl Into<String>) -> Self {
        Self {
            staging_schema: staging_schema.into(),
            warehouse_schema: warehouse_schema.into(),
        }
    }

    /// Staging copy of the raw table `source`.
    pub fn staging_table(&self, source: &str) -> TableName {
        TableName::new(&self.staging_schema, format!("stg_{source}"))
    }

    pub fn staging_for(&self, spec: &StagingSpec) -> TableName {
        TableName::new(&self.staging_schema, spec.staging_name())
    }

    pub fn dimension_table(&self, spec: &DimensionSpec) -> TableName {
        TableName::new(&self.warehouse_schema, spec.name)
    }

    pub fn fact_table(&self, spec: &FactSpec) -> TableName {
        TableName::new(&self.warehouse_schema, spec.name)
    }

    pub fn date_dimension(&self) -> TableName {
        TableName::new(&self.warehouse_schema, DATE_DIMENSION)
    }
}

impl Default for WarehouseLayout {
    fn default() -> Self {
        Self::new("staging", "dwh")
    }
}

impl From<&PipelineConfig> for WarehouseLayout {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(&config.staging_schema, &config.warehouse_schema)
    }
}
