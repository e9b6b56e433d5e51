use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use time::Date;

use crate::model::VarianceForecast;
use crate::{business_days_after, format_date, ForecastError};

/// Public forecast: business date to volatility (standard deviation, in the
/// same percentage units as the returns).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastResult {
    values: BTreeMap<Date, f64>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, date: Date) -> Option<f64> {
        self.values.get(&date).copied()
    }

    pub fn dates(&self) -> Vec<Date> {
        self.values.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.values.iter().map(|(date, value)| (*date, *value))
    }
}

impl Serialize for ForecastResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (date, value) in &self.values {
            map.serialize_entry(&format_date(*date), value)?;
        }
        map.end()
    }
}

/// Key `forecast`'s variances by the business days after `last_data_date`
/// and convert each to a volatility. Fails with [`ForecastError::Format`]
/// when the calendar runs out of dates for the horizon.
pub fn format_forecast(
    forecast: &VarianceForecast,
    last_data_date: Date,
) -> Result<ForecastResult, ForecastError> {
    let dates = business_days_after(last_data_date, forecast.horizon());
    if dates.len() != forecast.variances.len() {
        return Err(ForecastError::Format {
            values: forecast.variances.len(),
            dates: dates.len(),
        });
    }

    let values = dates
        .into_iter()
        .zip(&forecast.variances)
        .map(|(date, variance)| (date, volatility(*variance)))
        .collect();
    Ok(ForecastResult { values })
}

fn volatility(variance: f64) -> f64 {
    // NaN fails the comparison and clamps too.
    if variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn forecast(variances: Vec<f64>) -> VarianceForecast {
        VarianceForecast {
            last_date: date!(2024 - 01 - 05),
            variances,
        }
    }

    #[test]
    fn friday_forecast_lands_on_next_week() {
        let result = format_forecast(
            &forecast(vec![1.0, 4.0, 9.0, 2.25, 0.25]),
            date!(2024 - 01 - 05),
        )
        .expect("format");

        assert_eq!(
            result.dates(),
            vec![
                date!(2024 - 01 - 08),
                date!(2024 - 01 - 09),
                date!(2024 - 01 - 10),
                date!(2024 - 01 - 11),
                date!(2024 - 01 - 12),
            ]
        );
        let values: Vec<f64> = result.iter().map(|(_, value)| value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 1.5, 0.5]);
    }

    #[test]
    fn negative_and_nan_variances_clamp_to_zero() {
        let result = format_forecast(&forecast(vec![-1e-9, f64::NAN]), date!(2024 - 01 - 08))
            .expect("format");
        assert!(result.iter().all(|(_, value)| value == 0.0));
    }

    #[test]
    fn horizon_past_the_end_of_the_calendar_is_a_format_error() {
        let error = format_forecast(&forecast(vec![1.0; 10]), date!(9999 - 12 - 27))
            .expect_err("calendar overflow");
        assert!(matches!(error, ForecastError::Format { values: 10, dates: 4 }));
    }

    #[test]
    fn serializes_as_iso_date_keyed_object() {
        let result = format_forecast(&forecast(vec![4.0]), date!(2024 - 01 - 05)).expect("format");
        let json = serde_json::to_string(&result).expect("json");
        assert_eq!(json, r#"{"2024-01-08":2.0}"#);
    }
}
