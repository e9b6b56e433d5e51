//! Behavior-driven tests for the price cache path
//!
//! These tests verify WHEN volcast refetches prices, what ends up in the
//! cache, and what the describe views return.

mod support;

use support::{harness, simulated_bars, ticker, Backend, CountingFeed};
use time::macros::{date, datetime};
use time::Duration;
use volcast_core::{to_returns, DescribeView, PriceStore};

// =============================================================================
// Freshness: cache hits and misses
// =============================================================================

#[tokio::test]
async fn when_user_describes_twice_on_the_same_day_the_second_call_is_a_cache_hit() {
    // Given: A feed with data through today and an empty DuckDB cache
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 120, 1));
    let h = harness(feed.clone(), datetime!(2024-01-05 15:00 UTC), Backend::DuckDb);
    let ibm = ticker("IBM");

    // When: The user describes the ticker twice
    let first = h
        .orchestrator
        .ensure_and_describe(&ibm, DescribeView::Price)
        .await
        .expect("first describe");
    let second = h
        .orchestrator
        .ensure_and_describe(&ibm, DescribeView::Price)
        .await
        .expect("second describe");

    // Then: Only the first call reached the feed and both saw the same prices
    assert_eq!(feed.calls(), 1);
    assert!(first.refreshed);
    assert!(!second.refreshed);
    assert_eq!(first.points, second.points);
}

#[tokio::test]
async fn when_cached_prices_end_yesterday_they_are_refetched_and_fully_replaced() {
    // Given: A cache filled yesterday
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 04), 80, 2));
    let h = harness(feed.clone(), datetime!(2024-01-04 18:00 UTC), Backend::DuckDb);
    let ibm = ticker("IBM");
    h.orchestrator.ensure_price_data(&ibm).await.expect("seed cache");

    // When: The next day the feed has a shorter, newer history
    h.clock.advance(Duration::days(1));
    feed.serve(simulated_bars(date!(2024 - 01 - 05), 30, 3));
    let data = h.orchestrator.ensure_price_data(&ibm).await.expect("refresh");

    // Then: The cache holds exactly the new snapshot, with no leftover rows
    assert_eq!(feed.calls(), 2);
    assert!(data.refreshed);
    assert_eq!(data.series.len(), 30);
    let cached = h.prices.read(&ibm, None).expect("read all");
    assert_eq!(cached.len(), 30);
    assert_eq!(cached.last_date(), Some(date!(2024 - 01 - 05)));
}

#[tokio::test]
async fn when_data_ends_on_friday_a_weekend_request_refetches_again() {
    // Given: Friday's data cached on Saturday
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 60, 4));
    let h = harness(feed.clone(), datetime!(2024-01-06 09:00 UTC), Backend::Memory);
    let ibm = ticker("IBM");

    // When: Prices are ensured twice on Saturday
    h.orchestrator.ensure_price_data(&ibm).await.expect("first");
    let again = h.orchestrator.ensure_price_data(&ibm).await.expect("second");

    // Then: The coarse date-only gate treats Friday's data as stale both times
    assert_eq!(feed.calls(), 2);
    assert!(again.refreshed);
    assert_eq!(again.series.last_date(), Some(date!(2024 - 01 - 05)));
}

#[tokio::test]
async fn when_a_refresh_fails_the_previous_cache_is_left_untouched() {
    // Given: A cache filled yesterday
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 04), 50, 5));
    let h = harness(feed.clone(), datetime!(2024-01-04 18:00 UTC), Backend::DuckDb);
    let ibm = ticker("IBM");
    h.orchestrator.ensure_price_data(&ibm).await.expect("seed cache");

    // When: Today's refetch fails upstream
    h.clock.advance(Duration::days(1));
    feed.fail("Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day.");
    let error = h
        .orchestrator
        .ensure_price_data(&ibm)
        .await
        .expect_err("refresh must fail");

    // Then: The error is reported and yesterday's snapshot survives
    assert!(error.to_string().contains("rate limit"));
    let cached = h.prices.read(&ibm, None).expect("read");
    assert_eq!(cached.len(), 50);
    assert_eq!(cached.last_date(), Some(date!(2024 - 01 - 04)));
}

// =============================================================================
// Reads: limits and isolation
// =============================================================================

#[tokio::test]
async fn when_history_is_long_only_the_latest_observations_plus_one_are_returned() {
    // Given: A feed with more history than the configured observation count
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 500, 6));
    let h = harness(feed, datetime!(2024-01-05 15:00 UTC), Backend::DuckDb);
    let ibm = ticker("IBM");

    // When: Prices are ensured
    let data = h.orchestrator.ensure_price_data(&ibm).await.expect("ensure");

    // Then: 300 observations need 301 prices, ascending and ending today
    assert_eq!(data.series.len(), 301);
    assert_eq!(data.series.last_date(), Some(date!(2024 - 01 - 05)));
    let dates: Vec<_> = data.series.bars().iter().map(|bar| bar.date).collect();
    assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));

    // And: The full history is still cached
    assert_eq!(h.prices.read(&ibm, None).expect("read all").len(), 500);
}

#[tokio::test]
async fn when_tickers_differ_only_in_case_they_are_cached_separately() {
    // Given: A shared feed and store
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 40, 7));
    let h = harness(feed.clone(), datetime!(2024-01-05 15:00 UTC), Backend::DuckDb);

    // When: Both spellings are ensured
    h.orchestrator.ensure_price_data(&ticker("ibm")).await.expect("lower");
    h.orchestrator.ensure_price_data(&ticker("IBM")).await.expect("upper");

    // Then: Each spelling triggered its own fetch and snapshot
    assert_eq!(feed.calls(), 2);
    assert!(h.prices.snapshot(&ticker("ibm")).expect("snapshot").is_some());
    assert!(h.prices.snapshot(&ticker("IBM")).expect("snapshot").is_some());
}

// =============================================================================
// Describe views
// =============================================================================

#[tokio::test]
async fn when_user_asks_for_prices_they_align_with_return_rows() {
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 20, 8));
    let h = harness(feed, datetime!(2024-01-05 15:00 UTC), Backend::Memory);
    let ibm = ticker("IBM");

    let output = h
        .orchestrator
        .ensure_and_describe(&ibm, DescribeView::Price)
        .await
        .expect("describe");

    let series = h.prices.read(&ibm, None).expect("read");
    assert_eq!(output.points.len(), series.len() - 1);
    assert_eq!(output.points[0].date, series.bars()[1].date);
    assert_eq!(output.points[0].value, series.bars()[1].close);
}

#[tokio::test]
async fn when_user_asks_for_rolling_volatility_only_full_windows_are_reported() {
    let feed = CountingFeed::serving(simulated_bars(date!(2024 - 01 - 05), 20, 9));
    let h = harness(feed, datetime!(2024-01-05 15:00 UTC), Backend::Memory);
    let ibm = ticker("IBM");

    let output = h
        .orchestrator
        .ensure_and_describe(&ibm, DescribeView::RollingVolatility { window: 6 })
        .await
        .expect("describe");

    let returns = to_returns(&h.prices.read(&ibm, None).expect("read")).expect("returns");
    assert_eq!(output.points.len(), returns.len() - 5);
    assert_eq!(output.points[0].date, returns.points()[5].date);
    assert!(output.points.iter().all(|point| point.value >= 0.0));
}
