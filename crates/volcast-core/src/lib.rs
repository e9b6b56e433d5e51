//! # Volcast Core
//!
//! Price caching, GARCH fitting and volatility forecasting for volcast.
//!
//! ## Overview
//!
//! Given a ticker, volcast:
//!
//! - keeps the locally cached daily prices current as of today, refetching
//!   the full history when the cache is missing or stale;
//! - fits a GARCH(p, q) volatility model at most once per UTC day and reuses
//!   the day's artifact otherwise;
//! - forecasts volatility for the next business days as a date-keyed map.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Alpha Vantage price feed |
//! | [`artifact`] | Immutable model artifacts and their file store |
//! | [`clock`] | System and manual clocks |
//! | [`config`] | Environment-driven configuration |
//! | [`domain`] | Ticker, price and return types |
//! | [`error`] | Error taxonomy and pipeline stages |
//! | [`feed`] | Price feed trait |
//! | [`formatter`] | Variance forecast to public volatility map |
//! | [`freshness`] | Price and model freshness gates |
//! | [`http_client`] | HTTP transport seam |
//! | [`model`] | GARCH estimation and forecasting |
//! | [`orchestrator`] | The public operations |
//! | [`store`] | Price cache trait and implementations |
//! | [`throttling`] | Local API call budget |
//! | [`transform`] | Returns and rolling volatility |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volcast_core::{FitParams, ForecastOrchestrator, ForecastRequest, Ticker, VolcastConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = ForecastOrchestrator::from_config(&VolcastConfig::from_env())?;
//!
//!     let request = ForecastRequest {
//!         ticker: Ticker::parse("IBM")?,
//!         horizon: 5,
//!         use_new_data: true,
//!         fit: FitParams::default(),
//!     };
//!     let forecast = orchestrator.forecast_volatility(&request).await?;
//!     for (date, volatility) in forecast.iter() {
//!         println!("{date}: {volatility:.3}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Component operations return [`ForecastError`]; orchestrated operations
//! wrap the first failure in a [`PipelineError`] carrying the ticker and
//! [`Stage`]. Match on [`ErrorKind`] to tell "no data yet" from an upstream
//! failure:
//!
//! ```rust
//! use volcast_core::{ErrorKind, PipelineError};
//!
//! fn describe(error: &PipelineError) -> &'static str {
//!     match error.kind() {
//!         ErrorKind::NotFound | ErrorKind::NoArtifact => "nothing cached yet",
//!         ErrorKind::UpstreamData => "price source rejected the request",
//!         _ => "forecast failed",
//!     }
//! }
//! ```

pub mod adapters;
pub mod artifact;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod formatter;
pub mod freshness;
pub mod http_client;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod throttling;
pub mod transform;

pub use adapters::{parse_daily_series, AlphaVantageAdapter};
pub use artifact::{ArtifactKey, ArtifactStore, FileArtifactStore, ModelArtifact};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VolcastConfig;
pub use domain::{
    business_days_after, format_date, is_business_day, parse_date, PriceBar, PriceSeries,
    ReturnPoint, ReturnSeries, Ticker,
};
pub use error::{ErrorKind, ForecastError, PipelineError, Stage, ValidationError};
pub use feed::{OutputSize, PriceFeed};
pub use formatter::{format_forecast, ForecastResult};
pub use freshness::{has_fit_today, is_price_data_fresh};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use model::{FittedState, GarchModel, NelderMeadOptions, VarianceForecast, MAX_HORIZON};
pub use orchestrator::{
    DescribeOutput, DescribePoint, DescribeView, FitParams, FitRequest, ForecastOrchestrator,
    ForecastRequest, PriceData,
};
pub use store::{MemoryPriceStore, PriceStore, SnapshotInfo};
pub use throttling::RateGate;
pub use transform::{rolling_volatility, to_returns};

pub use volcast_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
