use std::fmt;

/// Name of a raw table inside the configured MySQL database.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TableName {
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> TableName {
        Self { name: name.into() }
    }

    /// Returns the name wrapped in backticks with embedded backticks doubled.
    pub fn as_quoted_identifier(&self) -> String {
        quote_identifier(&self.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Quotes a MySQL identifier with backticks.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}
