//! Configuration for the warehouse loader.
//!
//! Holds the connection settings for the raw store and the warehouse, the pipeline knobs
//! shared by every run, and the hierarchical loader that merges YAML/JSON files with
//! `APP_`-prefixed environment overrides.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
