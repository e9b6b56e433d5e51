//! Shared fixtures for the behaviour tests: a counting price feed, a canned
//! HTTP transport, GARCH-simulated prices and a wired orchestrator on a
//! manual clock.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use time::{Date, Duration, OffsetDateTime};
use volcast_core::{
    is_business_day, FileArtifactStore, ForecastError, ForecastOrchestrator, HttpClient,
    HttpError, HttpRequest, HttpResponse, ManualClock, MemoryPriceStore, PriceBar, PriceFeed,
    PriceSeries, PriceStore, Ticker, Warehouse, WarehouseConfig,
};

pub fn ticker(raw: &str) -> Ticker {
    Ticker::parse(raw).expect("valid ticker")
}

/// `count` daily bars on business days ending at `last_date`, with closes
/// following a GARCH(1, 1) return path.
pub fn simulated_bars(last_date: Date, count: usize, seed: u64) -> Vec<PriceBar> {
    let mut dates = Vec::with_capacity(count);
    let mut cursor = last_date;
    while dates.len() < count {
        if is_business_day(cursor) {
            dates.push(cursor);
        }
        cursor -= Duration::days(1);
    }
    dates.reverse();

    let (omega, alpha, beta) = (0.05, 0.10, 0.85);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut variance: f64 = omega / (1.0 - alpha - beta);
    let mut close = 100.0;
    dates
        .into_iter()
        .map(|date| {
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen();
            let shock = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            let return_pct = variance.sqrt() * shock;
            variance = omega + alpha * return_pct * return_pct + beta * variance;

            let open = close;
            close *= 1.0 + return_pct / 100.0;
            let high = open.max(close) * 1.002;
            let low = open.min(close) * 0.998;
            PriceBar::new(date, open, high, low, close).expect("simulated bar")
        })
        .collect()
}

pub fn simulated_series(raw_ticker: &str, last_date: Date, count: usize) -> PriceSeries {
    PriceSeries::new(ticker(raw_ticker), simulated_bars(last_date, count, 42)).expect("series")
}

/// Price feed serving a configurable answer and counting calls.
pub struct CountingFeed {
    answer: Mutex<Result<Vec<PriceBar>, String>>,
    calls: AtomicUsize,
}

impl CountingFeed {
    pub fn serving(bars: Vec<PriceBar>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(bars)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn serve(&self, bars: Vec<PriceBar>) {
        *self.answer.lock().expect("feed answer") = Ok(bars);
    }

    pub fn fail(&self, message: &str) {
        *self.answer.lock().expect("feed answer") = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceFeed for CountingFeed {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, ForecastError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.lock().expect("feed answer").clone();
        Box::pin(async move {
            let bars = answer.map_err(ForecastError::upstream)?;
            Ok(PriceSeries::new(ticker.clone(), bars)?)
        })
    }
}

/// Transport answering every request with the same response.
pub struct CannedHttpClient {
    response: HttpResponse,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    pub fn json(body: &str) -> Arc<Self> {
        Arc::new(Self {
            response: HttpResponse::ok_json(body),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("requests").push(request);
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}

/// Orchestrator over a temp model directory and a manual clock.
pub struct Harness {
    pub orchestrator: ForecastOrchestrator,
    pub prices: Arc<dyn PriceStore>,
    pub artifacts: Arc<FileArtifactStore>,
    pub clock: Arc<ManualClock>,
    pub temp: TempDir,
}

pub enum Backend {
    Memory,
    DuckDb,
}

pub fn harness(feed: Arc<dyn PriceFeed>, now: OffsetDateTime, backend: Backend) -> Harness {
    let temp = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(now));
    let prices: Arc<dyn PriceStore> = match backend {
        Backend::Memory => Arc::new(MemoryPriceStore::new(clock.clone())),
        Backend::DuckDb => Arc::new(
            Warehouse::open(WarehouseConfig::new(temp.path().join("cache").join("prices.duckdb")))
                .expect("warehouse"),
        ),
    };
    let artifacts = Arc::new(FileArtifactStore::new(temp.path().join("models"), clock.clone()));
    let orchestrator =
        ForecastOrchestrator::new(feed, prices.clone(), artifacts.clone(), clock.clone())
            .with_n_observations(300);

    Harness {
        orchestrator,
        prices,
        artifacts,
        clock,
        temp,
    }
}
