use std::fmt;

use crate::bail;
use crate::conversions::numeric::FixedDecimal;
use crate::error::{DwhResult, ErrorKind};

/// Logical column type shared by the raw store, staging and warehouse tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Double,
    /// Arbitrary precision decimal, optionally constrained to a fixed precision and scale.
    Numeric(Option<FixedDecimal>),
    Text,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Postgres type used when creating columns of this type.
    pub fn pg_type(&self) -> String {
        match self {
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Numeric(None) => "numeric".to_string(),
            ColumnType::Numeric(Some(decimal)) => {
                format!("numeric({}, {})", decimal.precision, decimal.scale)
            }
            ColumnType::Text => "text".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
        }
    }

    /// Maps `information_schema.columns.data_type` of a Postgres table.
    ///
    /// Types outside the supported set are read as text.
    pub fn from_pg_data_type(data_type: &str) -> ColumnType {
        match data_type {
            "boolean" => ColumnType::Boolean,
            "smallint" => ColumnType::SmallInt,
            "integer" => ColumnType::Integer,
            "bigint" => ColumnType::BigInt,
            "double precision" | "real" => ColumnType::Double,
            "numeric" => ColumnType::Numeric(None),
            "date" => ColumnType::Date,
            "timestamp without time zone" | "timestamp with time zone" => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }

    /// Maps MySQL `DATA_TYPE`/`COLUMN_TYPE` of a raw table.
    ///
    /// `tinyint(1)` is MySQL's boolean. Unsigned `bigint` may exceed the signed range and is
    /// widened to numeric.
    pub fn from_mysql(data_type: &str, column_type: &str) -> DwhResult<ColumnType> {
        let unsigned = column_type.contains("unsigned");
        let typ = match data_type {
            "tinyint" if column_type.starts_with("tinyint(1)") => ColumnType::Boolean,
            "bit" if column_type == "bit(1)" => ColumnType::Boolean,
            "boolean" | "bool" => ColumnType::Boolean,
            "tinyint" | "smallint" => ColumnType::SmallInt,
            "mediumint" | "int" | "integer" if !unsigned => ColumnType::Integer,
            "mediumint" | "int" | "integer" => ColumnType::BigInt,
            "bigint" if unsigned => ColumnType::Numeric(None),
            "bigint" => ColumnType::BigInt,
            "float" | "double" | "real" => ColumnType::Double,
            "decimal" | "numeric" => ColumnType::Numeric(None),
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum"
            | "set" | "json" => ColumnType::Text,
            "date" => ColumnType::Date,
            "datetime" | "timestamp" => ColumnType::Timestamp,
            other => bail!(
                ErrorKind::ConversionError,
                "Unsupported raw column type",
                other
            ),
        };

        Ok(typ)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pg_type())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable,
        }
    }
}

/// Ordered columns of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns the position of `name`, failing with [`ErrorKind::MissingColumn`].
    pub fn require(&self, table: &str, name: &str) -> DwhResult<usize> {
        match self.index_of(name) {
            Some(index) => Ok(index),
            None => bail!(
                ErrorKind::MissingColumn,
                "Configured column is missing from the table",
                format!("column `{name}` not found in `{table}`")
            ),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}
