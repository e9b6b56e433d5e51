use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock as _, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local call budget for a remote API.
///
/// Over-budget calls are refused immediately with the wait until the next
/// permit; nothing is queued or retried.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
}

impl RateGate {
    /// Allow `limit` calls per `window`, all of them available as a burst.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(window, limit))),
        }
    }

    /// Alpha Vantage free tier: 5 calls per minute.
    pub fn alphavantage_free_tier() -> Self {
        Self::new(Duration::from_secs(60), 5)
    }

    /// A gate that never refuses, for offline tests against canned transports.
    pub fn unlimited() -> Self {
        Self::new(Duration::from_millis(1), u32::MAX)
    }

    /// Take one permit, or return how long until one becomes available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter.check().map_err(|not_until| {
            not_until.wait_time_from(DefaultClock::default().now())
        })
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(1e-9);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
