use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ForecastError, PriceSeries, Ticker};

/// How much history a price feed returns per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    /// Latest 100 trading days.
    Compact,
    /// Full available history.
    #[default]
    Full,
}

impl OutputSize {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Full => "full",
        }
    }
}

impl Display for OutputSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown output size '{other}', expected compact or full")),
        }
    }
}

/// Remote source of daily price history.
///
/// Implementations return a normalized, ascending [`PriceSeries`] or
/// [`ForecastError::UpstreamData`]. They never retry.
pub trait PriceFeed: Send + Sync {
    /// Short identifier recorded alongside cached snapshots.
    fn name(&self) -> &'static str;

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, ForecastError>> + Send + 'a>>;
}
