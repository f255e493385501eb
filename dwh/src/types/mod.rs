//! Values, rows and schemas moved between the raw store and the warehouse.

mod cell;
mod keys;
mod schema;
mod table_row;
mod watermark;

pub use cell::Cell;
pub use keys::{CompanyKey, DateKey};
pub use schema::{ColumnSchema, ColumnType, TableSchema};
pub use table_row::{TableRow, TableRows};
pub use watermark::Watermark;
