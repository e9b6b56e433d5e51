//! CLI argument definitions for volcast.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `describe` | Refresh prices if stale and print rolling volatility or closes |
//! | `forecast` | Forecast volatility for the next business days |
//! | `fit` | Fit and save a new model regardless of today's fits |
//! | `models` | List stored model artifacts |
//! | `cache status` | Show the cached price snapshot |
//!
//! # Examples
//!
//! ```bash
//! volcast forecast IBM --horizon 5 --use-new-data
//! volcast describe IBM --view price --pretty
//! volcast fit IBM --p 2 --q 1 --n-observations 1500
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// GARCH volatility forecasts from locally cached daily prices.
#[derive(Debug, Parser)]
#[command(
    name = "volcast",
    author,
    version,
    about = "GARCH volatility forecasts from cached daily prices",
    long_about = "volcast keeps a local DuckDB cache of daily prices, fits a GARCH(p, q) \
model at most once per day and forecasts volatility for the next business days.\n\
\n\
Paths and the Alpha Vantage key come from VOLCAST_HOME, VOLCAST_DB_PATH, \
VOLCAST_MODEL_DIR and VOLCAST_ALPHAVANTAGE_API_KEY."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Time budget for the whole command in milliseconds.
    #[arg(long, global = true, default_value_t = 120_000)]
    pub timeout_ms: u64,

    /// Return observations used to fit (overrides the configured default).
    #[arg(long, global = true)]
    pub n_observations: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh prices if stale and print a descriptive series.
    ///
    /// Never fits or loads a model.
    Describe(DescribeArgs),

    /// Forecast volatility for the next business days.
    ///
    /// Fits today's model first when none exists. Prints
    /// {success, forecast, message}; exits non-zero on failure.
    Forecast(ForecastArgs),

    /// Fit and save a new model artifact.
    Fit(FitArgs),

    /// List stored model artifacts for a ticker, oldest first.
    Models(ModelsArgs),

    /// Price cache inspection.
    Cache(CacheArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescribeKind {
    /// Rolling standard deviation of daily returns.
    Volatility,
    /// Closing prices aligned with the return rows.
    Price,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    pub ticker: String,

    #[arg(long, value_enum, default_value_t = DescribeKind::Volatility)]
    pub view: DescribeKind,

    /// Rolling window in trading days (volatility view only).
    #[arg(long)]
    pub window: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ModelOrders {
    /// ARCH order.
    #[arg(long, default_value_t = 1)]
    pub p: usize,

    /// GARCH order.
    #[arg(long, default_value_t = 1)]
    pub q: usize,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    pub ticker: String,

    /// Business days to forecast (1 to 2520).
    #[arg(long, default_value_t = 5)]
    pub horizon: usize,

    /// Refetch prices before forecasting.
    #[arg(long, default_value_t = false)]
    pub use_new_data: bool,

    #[command(flatten)]
    pub orders: ModelOrders,
}

#[derive(Debug, Args)]
pub struct FitArgs {
    pub ticker: String,

    /// Refetch prices before fitting.
    #[arg(long, default_value_t = false)]
    pub use_new_data: bool,

    #[command(flatten)]
    pub orders: ModelOrders,
}

#[derive(Debug, Args)]
pub struct ModelsArgs {
    pub ticker: String,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show row count, date span and refresh time of a cached ticker.
    Status(CacheStatusArgs),
}

#[derive(Debug, Args)]
pub struct CacheStatusArgs {
    pub ticker: String,
}
