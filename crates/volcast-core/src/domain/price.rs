use serde::{Deserialize, Serialize};
use time::Date;

use super::date::iso_date;
use crate::{Ticker, ValidationError};

/// One trading day of open/high/low/close prices.
///
/// Only `close` feeds the return series, so it alone must be strictly
/// positive. Open, high and low only need to be finite and non-negative:
/// vendors report zeros or inverted ranges on some old rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, ValidationError> {
        validate_range_price("open", open)?;
        validate_range_price("high", high)?;
        validate_range_price("low", low)?;
        validate_close(close)?;

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
        })
    }
}

fn validate_range_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_close(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field: "close" });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field: "close" });
    }
    Ok(())
}

/// Daily price history of a ticker, ascending by date with unique dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: Ticker,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars in any order. Bars are sorted ascending;
    /// a repeated date is rejected rather than silently merged.
    pub fn new(ticker: Ticker, mut bars: Vec<PriceBar>) -> Result<Self, ValidationError> {
        bars.sort_by_key(|bar| bar.date);
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(ValidationError::DuplicateDate {
                date: super::format_date(pair[0].date),
            });
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<Date> {
        self.bars.first().map(|bar| bar.date)
    }

    pub fn last_date(&self) -> Option<Date> {
        self.bars.last().map(|bar| bar.date)
    }

    /// The most recent `limit` bars, still ascending.
    pub fn tail(&self, limit: usize) -> Self {
        let start = self.bars.len().saturating_sub(limit);
        Self {
            ticker: self.ticker.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }
}

/// Percentage return between consecutive closes, dated by the later close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub return_pct: f64,
}

/// Return series derived from a [`PriceSeries`]; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    ticker: Ticker,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub(crate) fn new(ticker: Ticker, points: Vec<ReturnPoint>) -> Self {
        Self { ticker, points }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.return_pct).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_date(&self) -> Option<Date> {
        self.points.last().map(|point| point.date)
    }
}
