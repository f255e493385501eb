//! MySQL helpers for reading the raw store.
//!
//! Identifier quoting, column introspection over `information_schema`, and test utilities
//! creating throwaway databases.

pub mod schema;
#[cfg(feature = "test-utils")]
pub mod sqlx;
pub mod types;
