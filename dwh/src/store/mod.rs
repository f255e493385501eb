//! Storage seams of the loader: the read-only raw store and the warehouse.

pub mod raw;
pub mod warehouse;
