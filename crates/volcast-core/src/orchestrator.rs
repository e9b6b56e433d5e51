//! # Forecast Orchestrator
//!
//! Composes the price feed, price cache, freshness gates, returns transform,
//! GARCH model, artifact store and formatter into the public operations.
//!
//! A forecast request walks these stages, never revisiting one:
//!
//! ```text
//! CheckPriceFreshness -> (RefreshPrice)? -> CheckModelFreshness -> (FitModel)?
//!     -> LoadModel -> Forecast -> Format
//! ```
//!
//! The first failure ends the request as a [`PipelineError`] naming the
//! ticker and stage. A committed price refresh is never rolled back.
//!
//! Price refresh and the check-fit-persist span run under a per-ticker async
//! lock, so within one process a ticker is fitted at most once per UTC day.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::Date;
use volcast_warehouse::{Warehouse, WarehouseConfig};

use crate::adapters::AlphaVantageAdapter;
use crate::artifact::{ArtifactKey, ArtifactStore, FileArtifactStore, ModelArtifact};
use crate::clock::{Clock, SystemClock};
use crate::config::{VolcastConfig, DEFAULT_N_OBSERVATIONS, DEFAULT_ROLLING_WINDOW};
use crate::domain::iso_date;
use crate::error::{ForecastError, PipelineError, Stage};
use crate::feed::PriceFeed;
use crate::formatter::{format_forecast, ForecastResult};
use crate::freshness::{has_fit_today, is_price_data_fresh};
use crate::model::{FittedState, GarchModel, MAX_HORIZON};
use crate::store::{PriceStore, SnapshotInfo};
use crate::transform::{rolling_volatility, to_returns};
use crate::{PriceSeries, ReturnSeries, Ticker};

/// Model orders and history length for a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FitParams {
    /// ARCH order (lagged squared residuals).
    pub p: usize,
    /// GARCH order (lagged conditional variances).
    pub q: usize,
    /// Return observations to fit on.
    pub n_observations: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            p: 1,
            q: 1,
            n_observations: DEFAULT_N_OBSERVATIONS,
        }
    }
}

impl FitParams {
    fn read_limit(&self) -> usize {
        self.n_observations.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub ticker: Ticker,
    pub horizon: usize,
    /// Refetch and replace the cached prices before any model work.
    pub use_new_data: bool,
    pub fit: FitParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitRequest {
    pub ticker: Ticker,
    pub use_new_data: bool,
    pub fit: FitParams,
}

/// Cached prices after the freshness gate.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceData {
    pub series: PriceSeries,
    /// Whether this call fetched and replaced the cache.
    pub refreshed: bool,
}

/// Descriptive series produced by [`ForecastOrchestrator::ensure_and_describe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescribeView {
    RollingVolatility { window: usize },
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescribePoint {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescribeOutput {
    pub ticker: Ticker,
    pub view: DescribeView,
    pub refreshed: bool,
    pub points: Vec<DescribePoint>,
}

pub struct ForecastOrchestrator {
    feed: Arc<dyn PriceFeed>,
    prices: Arc<dyn PriceStore>,
    artifacts: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    model: GarchModel,
    n_observations: usize,
    rolling_window: usize,
    locks: Mutex<HashMap<Ticker, Arc<tokio::sync::Mutex<()>>>>,
}

impl ForecastOrchestrator {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        prices: Arc<dyn PriceStore>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feed,
            prices,
            artifacts,
            clock,
            model: GarchModel::default(),
            n_observations: DEFAULT_N_OBSERVATIONS,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Production wiring: Alpha Vantage, the DuckDB cache and the model
    /// directory from `config`, on the system clock.
    pub fn from_config(config: &VolcastConfig) -> Result<Self, ForecastError> {
        let warehouse = Warehouse::open(WarehouseConfig {
            db_path: config.db_path.clone(),
            max_pool_size: config.max_pool_size,
        })?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let artifacts = FileArtifactStore::new(config.model_dir.clone(), clock.clone());

        Ok(Self::new(
            Arc::new(AlphaVantageAdapter::from_config(config)),
            Arc::new(warehouse),
            Arc::new(artifacts),
            clock,
        )
        .with_n_observations(config.n_observations)
        .with_rolling_window(config.rolling_window))
    }

    pub fn with_model(mut self, model: GarchModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_n_observations(mut self, n_observations: usize) -> Self {
        self.n_observations = n_observations;
        self
    }

    pub fn with_rolling_window(mut self, rolling_window: usize) -> Self {
        self.rolling_window = rolling_window;
        self
    }

    pub fn rolling_window(&self) -> usize {
        self.rolling_window
    }

    /// Make sure today's prices are cached, refetching on a miss or when the
    /// latest cached date is not today.
    pub async fn ensure_price_data(&self, ticker: &Ticker) -> Result<PriceData, PipelineError> {
        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().await;
        let limit = self.n_observations.saturating_add(1);
        self.ensure_price_data_locked(ticker, limit, false).await
    }

    /// Refresh prices if needed, then derive a descriptive series. Never
    /// touches the model.
    pub async fn ensure_and_describe(
        &self,
        ticker: &Ticker,
        view: DescribeView,
    ) -> Result<DescribeOutput, PipelineError> {
        let data = self.ensure_price_data(ticker).await?;
        let returns = to_returns(&data.series).map_err(at(ticker, Stage::Describe))?;

        let points = match view {
            DescribeView::RollingVolatility { window } => rolling_volatility(&returns, window)
                .map_err(at(ticker, Stage::Describe))?
                .into_iter()
                .map(|point| DescribePoint {
                    date: point.date,
                    value: point.return_pct,
                })
                .collect(),
            // Closes aligned with the return rows: the first close has no return.
            DescribeView::Price => data.series.bars()[1..]
                .iter()
                .map(|bar| DescribePoint {
                    date: bar.date,
                    value: bar.close,
                })
                .collect(),
        };

        Ok(DescribeOutput {
            ticker: ticker.clone(),
            view,
            refreshed: data.refreshed,
            points,
        })
    }

    /// Forecast `horizon` business days of volatility, fitting today's model
    /// first when none exists. Without `use_new_data` the fit uses whatever
    /// prices are cached.
    pub async fn forecast_volatility(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastResult, PipelineError> {
        let ticker = &request.ticker;
        if request.horizon == 0 || request.horizon > MAX_HORIZON {
            return Err(PipelineError::new(
                ticker,
                Stage::Forecast,
                ForecastError::fit(format!(
                    "forecast horizon must be between 1 and {MAX_HORIZON}, got {}",
                    request.horizon
                )),
            ));
        }

        let artifact = {
            let lock = self.ticker_lock(ticker);
            let _guard = lock.lock().await;

            let refreshed = if request.use_new_data {
                Some(
                    self.ensure_price_data_locked(ticker, request.fit.read_limit(), true)
                        .await?
                        .series,
                )
            } else {
                None
            };

            let today = self.clock.today();
            let fitted_today = has_fit_today(self.artifacts.as_ref(), ticker, today)
                .map_err(at(ticker, Stage::CheckModelFreshness))?;
            if fitted_today {
                tracing::debug!(%ticker, %today, "reusing today's model artifact");
            } else {
                let series = match refreshed {
                    Some(series) => series,
                    None => self
                        .prices
                        .read(ticker, Some(request.fit.read_limit()))
                        .map_err(at(ticker, Stage::FitModel))?,
                };
                self.fit_and_save(ticker, &series, request.fit).await?;
            }

            self.artifacts
                .load_latest(ticker)
                .map_err(at(ticker, Stage::LoadModel))?
        };

        let variances = self
            .model
            .forecast(&artifact.state, request.horizon)
            .map_err(at(ticker, Stage::Forecast))?;
        let result = format_forecast(&variances, artifact.state.last_date)
            .map_err(at(ticker, Stage::Format))?;

        tracing::info!(
            %ticker,
            horizon = request.horizon,
            fitted_at = %artifact.fit_timestamp,
            "volatility forecast ready"
        );
        Ok(result)
    }

    /// Fit and persist a new artifact regardless of today's fits.
    pub async fn fit_model(&self, request: &FitRequest) -> Result<ModelArtifact, PipelineError> {
        let ticker = &request.ticker;
        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().await;

        let series = if request.use_new_data {
            self.ensure_price_data_locked(ticker, request.fit.read_limit(), true)
                .await?
                .series
        } else {
            self.prices
                .read(ticker, Some(request.fit.read_limit()))
                .map_err(at(ticker, Stage::FitModel))?
        };
        self.fit_and_save(ticker, &series, request.fit).await
    }

    /// Stored artifact keys for `ticker`, oldest first.
    pub fn list_models(&self, ticker: &Ticker) -> Result<Vec<ArtifactKey>, PipelineError> {
        self.artifacts
            .list(ticker)
            .map_err(at(ticker, Stage::LoadModel))
    }

    /// Metadata of the cached price snapshot, if any.
    pub fn price_snapshot(&self, ticker: &Ticker) -> Result<Option<SnapshotInfo>, PipelineError> {
        self.prices
            .snapshot(ticker)
            .map_err(at(ticker, Stage::CheckPriceFreshness))
    }

    async fn ensure_price_data_locked(
        &self,
        ticker: &Ticker,
        limit: usize,
        force_refresh: bool,
    ) -> Result<PriceData, PipelineError> {
        let today = self.clock.today();
        let cached = match self.prices.read(ticker, Some(limit)) {
            Ok(series) => Some(series),
            Err(ForecastError::NotFound { .. }) => None,
            Err(error) => return Err(PipelineError::new(ticker, Stage::CheckPriceFreshness, error)),
        };

        if !force_refresh && is_price_data_fresh(cached.as_ref(), today) {
            if let Some(series) = cached {
                tracing::debug!(%ticker, rows = series.len(), "price cache is fresh");
                return Ok(PriceData {
                    series,
                    refreshed: false,
                });
            }
        }

        tracing::debug!(
            %ticker,
            %today,
            cached_until = ?cached.as_ref().and_then(PriceSeries::last_date),
            force_refresh,
            "refreshing price cache"
        );
        let fetched = self
            .feed
            .fetch(ticker)
            .await
            .map_err(at(ticker, Stage::RefreshPrice))?;
        let written = self
            .prices
            .replace(ticker, &fetched, self.feed.name())
            .map_err(at(ticker, Stage::RefreshPrice))?;
        tracing::info!(
            %ticker,
            rows = written,
            last_date = ?fetched.last_date(),
            source = self.feed.name(),
            "price cache replaced"
        );

        let series = self
            .prices
            .read(ticker, Some(limit))
            .map_err(at(ticker, Stage::RefreshPrice))?;
        Ok(PriceData {
            series,
            refreshed: true,
        })
    }

    async fn fit_and_save(
        &self,
        ticker: &Ticker,
        series: &PriceSeries,
        params: FitParams,
    ) -> Result<ModelArtifact, PipelineError> {
        let returns = to_returns(series).map_err(at(ticker, Stage::FitModel))?;
        let state = self.fit_blocking(returns, params).await.map_err(at(ticker, Stage::FitModel))?;
        tracing::info!(
            %ticker,
            p = params.p,
            q = params.q,
            n_obs = state.n_obs,
            last_date = %state.last_date,
            "fitted volatility model"
        );
        self.artifacts
            .save(ticker, &state)
            .map_err(at(ticker, Stage::FitModel))
    }

    async fn fit_blocking(
        &self,
        returns: ReturnSeries,
        params: FitParams,
    ) -> Result<FittedState, ForecastError> {
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || model.fit(&returns, params.p, params.q))
            .await
            .map_err(|error| ForecastError::fit(format!("fit task failed: {error}")))?
    }

    /// Entries held only by the map are idle and dropped here, so the map
    /// stays bounded by the tickers currently in flight.
    fn ticker_lock(&self, ticker: &Ticker) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(ticker.clone()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn at(ticker: &Ticker, stage: Stage) -> impl Fn(ForecastError) -> PipelineError + '_ {
    move |error| PipelineError::new(ticker, stage, error)
}
