//! Freshness gates deciding between cache reuse and refetch or refit.
//!
//! Both gates compare calendar dates only. There is no trading calendar, so
//! data fetched on a weekend whose last row is Friday reads as stale again.

use time::Date;

use crate::artifact::ArtifactStore;
use crate::{ForecastError, PriceSeries, Ticker};

/// True iff `cached` is present, non-empty and its latest date is `as_of`.
pub fn is_price_data_fresh(cached: Option<&PriceSeries>, as_of: Date) -> bool {
    cached
        .and_then(PriceSeries::last_date)
        .is_some_and(|last| last == as_of)
}

/// True iff any artifact for `ticker` was fitted on `as_of` (UTC).
pub fn has_fit_today(
    store: &dyn ArtifactStore,
    ticker: &Ticker,
    as_of: Date,
) -> Result<bool, ForecastError> {
    Ok(store
        .list(ticker)?
        .iter()
        .any(|key| key.fit_date() == as_of))
}
