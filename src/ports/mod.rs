//! Port traits implemented by adapters.

pub mod config_port;
pub mod price_source_port;
pub mod price_store_port;
pub mod report_port;
