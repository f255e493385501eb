use std::fmt;

use pg_escape::quote_identifier;

/// Schema-qualified name of a warehouse table.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns `"schema"."name"` with both parts escaped as Postgres identifiers.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }

    /// Returns a constraint or index name derived from the table name.
    pub fn derived_name(&self, suffix: &str) -> String {
        quote_identifier(&format!("{}_{suffix}", self.name)).into_owned()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Quotes a column name for interpolation into generated SQL.
pub fn quote_column(name: &str) -> String {
    quote_identifier(name).into_owned()
}
