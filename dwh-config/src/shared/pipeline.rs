use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::ValidationError;

const fn default_max_connections() -> u32 {
    4
}

const fn default_insert_batch_size() -> usize {
    1_000
}

fn default_staging_schema() -> String {
    "staging".to_string()
}

fn default_warehouse_schema() -> String {
    "dwh".to_string()
}

/// How a raw table is copied into staging.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Replace the staging table with every source row.
    Full,
    /// Append source rows newer than the staging watermark.
    #[default]
    Incremental,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Full => "full",
            TransferMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "historical" => Ok(TransferMode::Full),
            "incremental" => Ok(TransferMode::Incremental),
            other => Err(format!(
                "unknown transfer mode `{other}`, expected `full` or `incremental`"
            )),
        }
    }
}

/// Calendar range covered by the date dimension.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateDimensionConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Settings shared by every staging and transform run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Schema of the `stg_<table>` copies.
    #[serde(default = "default_staging_schema")]
    pub staging_schema: String,
    /// Schema of the dimension and fact tables.
    #[serde(default = "default_warehouse_schema")]
    pub warehouse_schema: String,
    /// Mode used when a transfer command does not name one.
    #[serde(default)]
    pub transfer_mode: TransferMode,
    /// Upper bound of pooled connections per database.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Rows per multi-row `INSERT` statement.
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    /// Range seeded into the date dimension by `prepare`.
    #[serde(default)]
    pub date_dimension: Option<DateDimensionConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_schema: default_staging_schema(),
            warehouse_schema: default_warehouse_schema(),
            transfer_mode: TransferMode::default(),
            max_connections: default_max_connections(),
            insert_batch_size: default_insert_batch_size(),
            date_dimension: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for schema in [&self.staging_schema, &self.warehouse_schema] {
            if !is_valid_identifier(schema) {
                return Err(ValidationError::InvalidSchemaName(schema.clone()));
            }
        }

        if self.staging_schema == self.warehouse_schema {
            return Err(ValidationError::SchemasCollide(self.staging_schema.clone()));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::MaxConnectionsZero);
        }

        if self.insert_batch_size == 0 {
            return Err(ValidationError::InsertBatchSizeZero);
        }

        if let Some(range) = &self.date_dimension
            && range.start > range.end
        {
            return Err(ValidationError::EmptyDateRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
            });
        }

        Ok(())
    }
}

/// Lower-case identifiers only, so schema names never need quoting.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.staging_schema, "staging");
        assert_eq!(config.warehouse_schema, "dwh");
        assert_eq!(config.transfer_mode, TransferMode::Incremental);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_colliding_schemas() {
        let config = PipelineConfig {
            warehouse_schema: "staging".to_string(),
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::SchemasCollide("staging".to_string()))
        );
    }

    #[test]
    fn rejects_unquotable_schema_names() {
        let config = PipelineConfig {
            staging_schema: "Staging; drop".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidSchemaName(_))
        ));
    }

    #[test]
    fn rejects_inverted_date_range() {
        let config = PipelineConfig {
            date_dimension: Some(DateDimensionConfig {
                start: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            }),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyDateRange { .. })
        ));
    }

    #[test]
    fn parses_transfer_modes() {
        assert_eq!("FULL".parse::<TransferMode>(), Ok(TransferMode::Full));
        assert_eq!("historical".parse::<TransferMode>(), Ok(TransferMode::Full));
        assert_eq!(
            "incremental".parse::<TransferMode>(),
            Ok(TransferMode::Incremental)
        );
        assert!("delta".parse::<TransferMode>().is_err());
    }
}
