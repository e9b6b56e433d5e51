use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Date, UtcOffset};
use volcast_warehouse::{PriceRecord, SnapshotRecord, Warehouse};

use crate::clock::Clock;
use crate::domain::iso_date;
use crate::{format_date, parse_date, ForecastError, PriceBar, PriceSeries, Ticker};

/// Metadata about the cached snapshot of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    pub ticker: Ticker,
    pub row_count: usize,
    #[serde(with = "iso_date::option")]
    pub first_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub last_date: Option<Date>,
    pub source: String,
    pub refreshed_at: String,
}

/// Per-ticker cache of daily price history.
///
/// Snapshots are only ever replaced wholesale; there is no incremental merge.
pub trait PriceStore: Send + Sync {
    /// Overwrite everything cached for `ticker` with `series`. Returns the
    /// number of rows written.
    fn replace(
        &self,
        ticker: &Ticker,
        series: &PriceSeries,
        source: &str,
    ) -> Result<usize, ForecastError>;

    /// The most recent `limit` rows (all rows when `None`), ascending.
    /// Fails with [`ForecastError::NotFound`] if the ticker was never cached.
    fn read(&self, ticker: &Ticker, limit: Option<usize>) -> Result<PriceSeries, ForecastError>;

    fn snapshot(&self, ticker: &Ticker) -> Result<Option<SnapshotInfo>, ForecastError>;
}

impl PriceStore for Warehouse {
    fn replace(
        &self,
        ticker: &Ticker,
        series: &PriceSeries,
        source: &str,
    ) -> Result<usize, ForecastError> {
        let rows = series
            .bars()
            .iter()
            .map(|bar| PriceRecord {
                date: format_date(bar.date),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
            })
            .collect::<Vec<_>>();
        Ok(self.replace_prices(ticker.as_str(), source, &rows)?)
    }

    fn read(&self, ticker: &Ticker, limit: Option<usize>) -> Result<PriceSeries, ForecastError> {
        let records = self
            .read_prices(ticker.as_str(), limit)?
            .ok_or_else(|| ForecastError::NotFound {
                ticker: ticker.clone(),
            })?;

        let bars = records
            .iter()
            .map(record_to_bar)
            .collect::<Result<Vec<_>, _>>()?;
        PriceSeries::new(ticker.clone(), bars)
            .map_err(|error| ForecastError::storage(format!("corrupt price cache: {error}")))
    }

    fn snapshot(&self, ticker: &Ticker) -> Result<Option<SnapshotInfo>, ForecastError> {
        Warehouse::snapshot(self, ticker.as_str())?
            .map(|record| snapshot_info(ticker, record))
            .transpose()
    }
}

fn record_to_bar(record: &PriceRecord) -> Result<PriceBar, ForecastError> {
    let date = parse_date(&record.date)
        .map_err(|error| ForecastError::storage(format!("corrupt price cache: {error}")))?;
    PriceBar::new(date, record.open, record.high, record.low, record.close)
        .map_err(|error| ForecastError::storage(format!("corrupt price cache on {date}: {error}")))
}

fn snapshot_info(ticker: &Ticker, record: SnapshotRecord) -> Result<SnapshotInfo, ForecastError> {
    let optional_date = |value: Option<String>| {
        value
            .map(|value| parse_date(&value))
            .transpose()
            .map_err(|error| ForecastError::storage(format!("corrupt snapshot row: {error}")))
    };

    Ok(SnapshotInfo {
        ticker: ticker.clone(),
        row_count: usize::try_from(record.row_count).unwrap_or(0),
        first_date: optional_date(record.first_date)?,
        last_date: optional_date(record.last_date)?,
        source: record.source,
        refreshed_at: record.refreshed_at,
    })
}

/// In-process price store for tests and ephemeral runs.
///
/// Refresh times are stamped from the injected clock.
pub struct MemoryPriceStore {
    entries: Mutex<HashMap<Ticker, (PriceSeries, SnapshotInfo)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryPriceStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl PriceStore for MemoryPriceStore {
    fn replace(
        &self,
        ticker: &Ticker,
        series: &PriceSeries,
        source: &str,
    ) -> Result<usize, ForecastError> {
        let stored = PriceSeries::new(ticker.clone(), series.bars().to_vec())?;
        let info = SnapshotInfo {
            ticker: ticker.clone(),
            row_count: stored.len(),
            first_date: stored.first_date(),
            last_date: stored.last_date(),
            source: source.to_owned(),
            refreshed_at: self
                .clock
                .now()
                .to_offset(UtcOffset::UTC)
                .format(&Rfc3339)
                .map_err(|error| ForecastError::storage(format!("refresh time: {error}")))?,
        };
        let written = stored.len();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticker.clone(), (stored, info));
        Ok(written)
    }

    fn read(&self, ticker: &Ticker, limit: Option<usize>) -> Result<PriceSeries, ForecastError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (series, _) = entries.get(ticker).ok_or_else(|| ForecastError::NotFound {
            ticker: ticker.clone(),
        })?;
        Ok(match limit {
            Some(limit) => series.tail(limit),
            None => series.clone(),
        })
    }

    fn snapshot(&self, ticker: &Ticker) -> Result<Option<SnapshotInfo>, ForecastError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(ticker).map(|(_, info)| info.clone()))
    }
}
