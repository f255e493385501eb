//! Transforms staged rows into the dimensional schema.

pub mod dimension;
pub mod fact;
pub mod keys;

pub use dimension::merge_dimension;
pub use fact::merge_fact;
pub use keys::KeyResolver;
