mod base;
pub mod ddl;
pub mod memory;
pub mod postgres;

pub use base::{
    DateStore, DimensionChanges, DimensionStore, Expiration, FactBatch, FactStore, LineageStore,
    StagingStore, UpsertCounts, Warehouse, WarehouseAdmin,
};
