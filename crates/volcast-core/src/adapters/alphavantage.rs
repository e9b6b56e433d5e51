use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::feed::{OutputSize, PriceFeed};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::throttling::RateGate;
use crate::{parse_date, ForecastError, PriceBar, PriceSeries, Ticker, VolcastConfig};

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
const DAILY_FUNCTION: &str = "TIME_SERIES_DAILY_ADJUSTED";
const DAILY_SERIES_KEY: &str = "Time Series (Daily)";

/// Daily adjusted price history from Alpha Vantage.
///
/// Only open/high/low/close survive normalization; adjusted close, volume,
/// dividend and split fields are dropped.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    output_size: OutputSize,
    rate_gate: RateGate,
    timeout_ms: u64,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            output_size: OutputSize::Full,
            rate_gate: RateGate::alphavantage_free_tier(),
            timeout_ms: 30_000,
        }
    }

    /// Production adapter using reqwest and the configured key and output size.
    pub fn from_config(config: &VolcastConfig) -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()), config.api_key.clone())
            .with_output_size(config.output_size)
    }

    pub fn with_output_size(mut self, output_size: OutputSize) -> Self {
        self.output_size = output_size;
        self
    }

    pub fn with_rate_gate(mut self, rate_gate: RateGate) -> Self {
        self.rate_gate = rate_gate;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn daily_request(&self, ticker: &Ticker) -> HttpRequest {
        HttpRequest::get(&self.base_url)
            .with_query("function", DAILY_FUNCTION)
            .with_query("symbol", ticker.as_str())
            .with_query("outputsize", self.output_size.as_str())
            .with_query("datatype", "json")
            .with_query("apikey", &self.api_key)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn fetch_daily(&self, ticker: &Ticker) -> Result<PriceSeries, ForecastError> {
        if let Err(wait) = self.rate_gate.try_acquire() {
            return Err(ForecastError::upstream(format!(
                "alphavantage call budget exhausted; next call allowed in {:.1}s",
                wait.as_secs_f64()
            )));
        }

        let request = self.daily_request(ticker);
        tracing::debug!(%ticker, url = %request.redacted_url(), "requesting daily prices");

        let response = self.http_client.execute(request).await.map_err(|error| {
            ForecastError::upstream(format!("alphavantage transport error: {}", error.message()))
        })?;

        if !response.is_success() {
            return Err(ForecastError::upstream(format!(
                "alphavantage returned status {}",
                response.status
            )));
        }

        parse_daily_series(ticker, &response.body)
    }
}

impl PriceFeed for AlphaVantageAdapter {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, ForecastError>> + Send + 'a>> {
        Box::pin(async move {
            let result = self.fetch_daily(ticker).await;
            match &result {
                Ok(series) => {
                    tracing::info!(%ticker, rows = series.len(), "fetched daily prices");
                }
                Err(error) => tracing::warn!(%ticker, %error, "daily price fetch failed"),
            }
            result
        })
    }
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
}

/// Alpha Vantage serializes every number as a string.
#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
}

/// Normalize a `TIME_SERIES_DAILY_ADJUSTED` body into an ascending series.
pub fn parse_daily_series(ticker: &Ticker, body: &str) -> Result<PriceSeries, ForecastError> {
    let response: DailyResponse = serde_json::from_str(body).map_err(|error| {
        ForecastError::upstream(format!("malformed alphavantage response: {error}"))
    })?;

    let Some(series) = response.series else {
        let detail = response
            .error_message
            .or(response.note)
            .or(response.information)
            .unwrap_or_else(|| String::from("no further detail"));
        return Err(ForecastError::upstream(format!(
            "response for '{ticker}' has no '{DAILY_SERIES_KEY}' payload: {detail}"
        )));
    };

    if series.is_empty() {
        return Err(ForecastError::upstream(format!(
            "alphavantage returned an empty series for '{ticker}'"
        )));
    }

    let bars = series
        .into_iter()
        .map(|(date, bar)| normalize_bar(&date, &bar))
        .collect::<Result<Vec<_>, _>>()?;

    PriceSeries::new(ticker.clone(), bars)
        .map_err(|error| ForecastError::upstream(format!("invalid alphavantage series: {error}")))
}

fn normalize_bar(date: &str, bar: &DailyBar) -> Result<PriceBar, ForecastError> {
    let date = parse_date(date)
        .map_err(|error| ForecastError::upstream(format!("invalid alphavantage row: {error}")))?;
    let number = |field: &str, raw: &str| {
        raw.trim().parse::<f64>().map_err(|_| {
            ForecastError::upstream(format!("invalid {field} value '{raw}' on {date}"))
        })
    };

    PriceBar::new(
        date,
        number("open", &bar.open)?,
        number("high", &bar.high)?,
        number("low", &bar.low)?,
        number("close", &bar.close)?,
    )
    .map_err(|error| ForecastError::upstream(format!("invalid alphavantage row on {date}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::ErrorKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::macros::date;

    const DAILY_BODY: &str = r#"{
        "Meta Data": {"1. Information": "Daily Time Series with Splits and Dividend Events"},
        "Time Series (Daily)": {
            "2024-01-05": {"1. open": "160.0", "2. high": "161.5", "3. low": "159.0", "4. close": "161.0",
                           "5. adjusted close": "158.2", "6. volume": "1000", "7. dividend amount": "0.0000",
                           "8. split coefficient": "1.0"},
            "2024-01-04": {"1. open": "158.0", "2. high": "160.5", "3. low": "157.5", "4. close": "160.0",
                           "5. adjusted close": "157.2", "6. volume": "1200", "7. dividend amount": "0.0000",
                           "8. split coefficient": "1.0"}
        }
    }"#;

    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn ticker(raw: &str) -> Ticker {
        Ticker::parse(raw).expect("valid ticker")
    }

    #[tokio::test]
    async fn request_carries_function_symbol_and_output_size() {
        let client = RecordingHttpClient::new(Ok(HttpResponse::ok_json(DAILY_BODY)));
        let adapter = AlphaVantageAdapter::new(client.clone(), "alpha-key")
            .with_output_size(OutputSize::Compact);

        adapter.fetch(&ticker("IBM")).await.expect("fetch should succeed");

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.query_value("function"), Some(DAILY_FUNCTION));
        assert_eq!(request.query_value("symbol"), Some("IBM"));
        assert_eq!(request.query_value("outputsize"), Some("compact"));
        assert_eq!(request.query_value("apikey"), Some("alpha-key"));
    }

    #[test]
    fn normalizes_string_values_into_ascending_bars() {
        let series = parse_daily_series(&ticker("IBM"), DAILY_BODY).expect("parse");
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(date!(2024 - 01 - 04)));
        assert_eq!(series.last_date(), Some(date!(2024 - 01 - 05)));
        let last = series.bars()[1];
        assert_eq!((last.open, last.high, last.low, last.close), (160.0, 161.5, 159.0, 161.0));
    }

    #[test]
    fn old_rows_with_zero_open_are_kept() {
        let body = r#"{"Time Series (Daily)": {
            "1999-11-01": {"1. open": "0.0000", "2. high": "98.8100", "3. low": "96.3700", "4. close": "96.7500"},
            "1999-11-02": {"1. open": "96.7500", "2. high": "96.8100", "3. low": "93.6900", "4. close": "94.8100"}
        }}"#;

        let series = parse_daily_series(&ticker("IBM"), body).expect("parse");

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].open, 0.0);
        assert_eq!(series.bars()[0].close, 96.75);
    }

    #[test]
    fn zero_close_still_fails_the_series() {
        let body = r#"{"Time Series (Daily)": {
            "1999-11-01": {"1. open": "96.0", "2. high": "98.0", "3. low": "95.0", "4. close": "0.0000"}
        }}"#;

        let error = parse_daily_series(&ticker("IBM"), body).expect_err("zero close");
        assert_eq!(error.kind(), ErrorKind::UpstreamData);
        assert!(error.to_string().contains("close"));
    }

    #[test]
    fn missing_series_surfaces_upstream_message() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let error = parse_daily_series(&ticker("ZZZINVALID"), body).expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::UpstreamData);
        assert!(error.to_string().contains("Invalid API call"));
    }

    #[test]
    fn quota_note_is_an_upstream_error() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let error = parse_daily_series(&ticker("IBM"), body).expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::UpstreamData);
        assert!(error.to_string().contains("call frequency"));
    }

    #[test]
    fn empty_series_and_bad_numbers_are_rejected() {
        let empty = r#"{"Time Series (Daily)": {}}"#;
        assert_eq!(
            parse_daily_series(&ticker("IBM"), empty).expect_err("empty").kind(),
            ErrorKind::UpstreamData
        );

        let bad = r#"{"Time Series (Daily)": {"2024-01-05": {"1. open": "n/a", "2. high": "1", "3. low": "1", "4. close": "1"}}}"#;
        let error = parse_daily_series(&ticker("IBM"), bad).expect_err("bad number");
        assert!(error.to_string().contains("open"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let client = RecordingHttpClient::new(Ok(HttpResponse {
            status: 503,
            body: String::new(),
        }));
        let adapter = AlphaVantageAdapter::new(client, "alpha-key");

        let error = adapter.fetch(&ticker("IBM")).await.expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::UpstreamData);
        assert!(error.to_string().contains("503"));
    }

    #[tokio::test]
    async fn refuses_calls_beyond_the_local_budget_without_sending() {
        let client = RecordingHttpClient::new(Ok(HttpResponse::ok_json(DAILY_BODY)));
        let adapter = AlphaVantageAdapter::new(client.clone(), "alpha-key")
            .with_rate_gate(RateGate::new(Duration::from_secs(60), 2));

        for _ in 0..2 {
            adapter.fetch(&ticker("IBM")).await.expect("within budget");
        }
        let error = adapter.fetch(&ticker("IBM")).await.expect_err("over budget");
        assert_eq!(error.kind(), ErrorKind::UpstreamData);
        assert_eq!(client.recorded_requests().len(), 2);
    }
}
