use std::fmt::{Display, Formatter};

use thiserror::Error;
use volcast_warehouse::WarehouseError;

use crate::Ticker;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker must start with an ASCII letter or digit: '{ch}'")]
    TickerInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be strictly positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must not be negative")]
    NegativeValue { field: &'static str },

    #[error("duplicate price date {date}")]
    DuplicateDate { date: String },
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
}

/// Stable classification of [`ForecastError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UpstreamData,
    NotFound,
    NoArtifact,
    InsufficientData,
    Fit,
    Format,
    Storage,
    Validation,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpstreamData => "upstream_data",
            Self::NotFound => "not_found",
            Self::NoArtifact => "no_artifact",
            Self::InsufficientData => "insufficient_data",
            Self::Fit => "fit",
            Self::Format => "format",
            Self::Storage => "storage",
            Self::Validation => "validation",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the price, model and forecast components.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The remote price source returned no usable time series.
    #[error("upstream data error: {0}")]
    UpstreamData(String),

    /// No cached price data exists for the ticker.
    #[error("no cached price data for ticker '{ticker}'")]
    NotFound { ticker: Ticker },

    /// No model artifact was ever saved for the ticker.
    #[error("no model artifact for ticker '{ticker}'")]
    NoArtifact { ticker: Ticker },

    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// The volatility model could not be fitted or used.
    #[error("model fit error: {0}")]
    Fit(String),

    /// Forecast values and generated dates disagree in length.
    #[error("forecast format error: {values} values for {dates} dates")]
    Format { values: usize, dates: usize },

    /// Persistence failure in the price cache or artifact store.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ForecastError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamData(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::Fit(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UpstreamData(_) => ErrorKind::UpstreamData,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NoArtifact { .. } => ErrorKind::NoArtifact,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::Fit(_) => ErrorKind::Fit,
            Self::Format { .. } => ErrorKind::Format,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl From<WarehouseError> for ForecastError {
    fn from(error: WarehouseError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(format!("serialization error: {error}"))
    }
}

/// Pipeline states of a forecast request; used to qualify errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckPriceFreshness,
    RefreshPrice,
    Describe,
    CheckModelFreshness,
    FitModel,
    LoadModel,
    Forecast,
    Format,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckPriceFreshness => "check_price_freshness",
            Self::RefreshPrice => "refresh_price",
            Self::Describe => "describe",
            Self::CheckModelFreshness => "check_model_freshness",
            Self::FitModel => "fit_model",
            Self::LoadModel => "load_model",
            Self::Forecast => "forecast",
            Self::Format => "format",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First error raised by an orchestrated operation, with the ticker and stage
/// where it happened.
#[derive(Debug, Error)]
#[error("{stage} failed for '{ticker}': {source}")]
pub struct PipelineError {
    pub ticker: Ticker,
    pub stage: Stage,
    #[source]
    pub source: ForecastError,
}

impl PipelineError {
    pub fn new(ticker: &Ticker, stage: Stage, source: ForecastError) -> Self {
        Self {
            ticker: ticker.clone(),
            stage,
            source,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
