//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod params;
pub mod strategy;
pub mod position;
pub mod metrics;
pub mod backtest;
pub mod trainer;
pub mod walk_forward;
pub mod portfolio;
pub mod config_validation;
pub mod error;
