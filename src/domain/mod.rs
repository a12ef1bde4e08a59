//! Core domain types and logic.

pub mod allocator;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod price_matrix;
pub mod risk;
pub mod session;
pub mod statistics;
pub mod validation;
pub mod window;
