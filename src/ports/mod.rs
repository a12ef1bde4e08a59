//! Port traits the core depends on.

pub mod config_port;
pub mod price_port;
pub mod report_port;
