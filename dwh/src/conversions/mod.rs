//! Conversions between database values and [`crate::types::Cell`].

pub mod bool;
pub mod coerce;
pub mod mysql;
pub mod numeric;
pub mod postgres;
