//! Business logic layer.

pub mod mapping_service;
