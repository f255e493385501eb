//! Column names shared by every warehouse table.

/// Lineage column stamped by the extractors on raw rows and copied into staging.
pub const LOAD_TIMESTAMP: &str = "load_timestamp";

/// Lineage column of dimension versions and fact rows.
pub const DW_LOAD_TIMESTAMP: &str = "dw_load_timestamp";

pub const COMPANY_KEY: &str = "company_key";
pub const SYMBOL: &str = "symbol";
pub const VALID_FROM_DATE: &str = "valid_from_date";
pub const VALID_TO_DATE: &str = "valid_to_date";
pub const IS_CURRENT: &str = "is_current";

// Date dimension.
pub const DATE_KEY: &str = "date_key";
pub const FULL_DATE: &str = "full_date";
pub const YEAR: &str = "year";
pub const QUARTER: &str = "quarter";
pub const MONTH: &str = "month";
pub const DAY: &str = "day";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_WEEKEND: &str = "is_weekend";
