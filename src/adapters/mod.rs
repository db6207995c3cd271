//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod inflation_file_adapter;
#[cfg(feature = "nasdaq")]
pub mod nasdaq_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
