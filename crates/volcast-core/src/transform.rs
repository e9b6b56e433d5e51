use crate::{ForecastError, PriceSeries, ReturnPoint, ReturnSeries};

/// Percentage close-to-close returns: `(close[i] / close[i-1] - 1) * 100`,
/// dated by the later close. The undefined leading element is dropped.
pub fn to_returns(prices: &PriceSeries) -> Result<ReturnSeries, ForecastError> {
    if prices.len() < 2 {
        return Err(ForecastError::InsufficientData {
            required: 2,
            actual: prices.len(),
        });
    }

    let points = prices
        .bars()
        .windows(2)
        .map(|pair| ReturnPoint {
            date: pair[1].date,
            return_pct: (pair[1].close / pair[0].close - 1.0) * 100.0,
        })
        .collect();
    Ok(ReturnSeries::new(prices.ticker().clone(), points))
}

/// Rolling sample standard deviation (ddof = 1) of returns over `window`
/// points. Only full windows produce a value.
pub fn rolling_volatility(
    returns: &ReturnSeries,
    window: usize,
) -> Result<Vec<ReturnPoint>, ForecastError> {
    if window < 2 {
        return Err(ForecastError::InsufficientData {
            required: 2,
            actual: window,
        });
    }

    let points = returns.points();
    Ok(points
        .windows(window)
        .map(|slice| {
            let n = slice.len() as f64;
            let mean = slice.iter().map(|point| point.return_pct).sum::<f64>() / n;
            let variance = slice
                .iter()
                .map(|point| (point.return_pct - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            ReturnPoint {
                date: slice[slice.len() - 1].date,
                return_pct: variance.sqrt(),
            }
        })
        .collect())
}
