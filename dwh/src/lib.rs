//! Incremental staging and dimensional load of the financial warehouse.
//!
//! Raw tables written by the extractors are copied into `stg_` tables of the staging
//! schema, then merged into the SCD type 2 company dimension and the fact tables of the
//! warehouse schema. Every step is driven by high-water marks read from the destination,
//! so the loader keeps no state of its own and can be re-run at any time.
//!
//! [`pipeline::Pipeline`] is the entry point; the stores behind it are described by the
//! traits of [`store`].

pub mod catalog;
pub mod conversions;
pub mod error;
pub mod failpoints;
mod macros;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod state;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tracker;
pub mod transfer;
pub mod types;

pub use dwh_config::shared::TransferMode;
