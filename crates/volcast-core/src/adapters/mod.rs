//! Remote price feed adapters.

pub mod alphavantage;

pub use alphavantage::{parse_daily_series, AlphaVantageAdapter};
