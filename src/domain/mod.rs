//! Core domain types and logic.

pub mod asset;
pub mod config_validation;
pub mod error;
pub mod hurst;
pub mod inflation;
pub mod ingestion;
pub mod metrics;
pub mod price;
pub mod price_matrix;
pub mod result_table;
pub mod stats;
