//! Database access layer.

pub mod mappings;
