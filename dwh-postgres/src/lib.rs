//! Postgres helpers for the warehouse side of the loader.
//!
//! Identifier quoting, catalog introspection over `information_schema`, and test utilities
//! creating throwaway databases.

pub mod schema;
#[cfg(feature = "test-utils")]
pub mod sqlx;
pub mod types;
