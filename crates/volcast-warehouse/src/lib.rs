//! # Volcast Warehouse
//!
//! DuckDB-backed cache of daily price history for volcast.
//!
//! ## Overview
//!
//! Each ticker owns one logical price table, stored as the rows of
//! `price_history` that carry its ticker. Snapshots are replaced wholesale:
//! a refresh deletes the ticker's rows and inserts the new series inside a
//! single transaction, so readers never observe a partial merge.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `price_history` | Daily OHLC rows keyed by `(ticker, date)` |
//! | `price_snapshots` | One row per cached ticker: row count, date span, refresh time |
//! | `ingest_log` | Audit row per snapshot replacement |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volcast_warehouse::{PriceRecord, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::new("/tmp/prices.duckdb"))?;
//!
//!     let rows = vec![PriceRecord {
//!         date: "2024-01-05".to_string(),
//!         open: 100.0,
//!         high: 101.0,
//!         low: 99.5,
//!         close: 100.5,
//!     }];
//!     warehouse.replace_prices("IBM", "alphavantage", &rows)?;
//!
//!     let cached = warehouse.read_prices("IBM", Some(10))?;
//!     println!("cached {} rows", cached.map(|rows| rows.len()).unwrap_or(0));
//!     Ok(())
//! }
//! ```

pub mod duckdb;
pub mod migrations;

use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, ToSql};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row could not be written or read back as a price record.
    #[error("invalid price row: {0}")]
    InvalidRow(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections in the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_pool_size: 4,
        }
    }
}

/// A daily price row as stored in `price_history`.
///
/// Dates travel as ISO `YYYY-MM-DD` strings and are cast to `DATE` in SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Metadata describing the cached snapshot of one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub ticker: String,
    pub row_count: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub source: String,
    pub refreshed_at: String,
}

/// The main warehouse interface for cached price history.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse, creating the database file and schema when missing.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Replace the full cached snapshot for `ticker` with `rows`.
    ///
    /// Deletes every existing row for the ticker, inserts the new rows, updates
    /// `price_snapshots` and appends an `ingest_log` entry, all in one
    /// transaction. Returns the number of price rows written.
    ///
    /// # Security
    /// All user-provided values are passed as query parameters.
    pub fn replace_prices(
        &self,
        ticker: &str,
        source: &str,
        rows: &[PriceRecord],
    ) -> Result<usize, WarehouseError> {
        let request_id = Uuid::new_v4().to_string();
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            connection.execute("DELETE FROM price_history WHERE ticker = ?", params![ticker])?;

            let mut insert = connection.prepare(
                "INSERT INTO price_history (ticker, date, open, high, low, close) \
                 VALUES (?, CAST(? AS DATE), ?, ?, ?, ?)",
            )?;
            for row in rows {
                let values: [&dyn ToSql; 6] =
                    [&ticker, &row.date, &row.open, &row.high, &row.low, &row.close];
                insert.execute(values.as_slice())?;
            }

            let row_count = rows.len() as i64;
            let first_date = rows.iter().map(|row| row.date.as_str()).min();
            let last_date = rows.iter().map(|row| row.date.as_str()).max();
            let values: [&dyn ToSql; 5] = [&ticker, &row_count, &first_date, &last_date, &source];
            connection.execute(
                "INSERT OR REPLACE INTO price_snapshots \
                 (ticker, row_count, first_date, last_date, source, refreshed_at) \
                 VALUES (?, ?, CAST(? AS DATE), CAST(? AS DATE), ?, CURRENT_TIMESTAMP)",
                values.as_slice(),
            )?;

            let values: [&dyn ToSql; 4] = [&request_id, &ticker, &source, &row_count];
            connection.execute(
                "INSERT INTO ingest_log (request_id, ticker, source, row_count, status, timestamp) \
                 VALUES (?, ?, ?, ?, 'replaced', CURRENT_TIMESTAMP)",
                values.as_slice(),
            )?;

            Ok(rows.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        tracing::debug!(ticker, source, rows = written, request_id, "price snapshot replaced");
        Ok(written)
    }

    /// Read the most recent `limit` rows for `ticker` (all rows when `None`),
    /// in ascending date order.
    ///
    /// Returns `Ok(None)` when the ticker has never been cached.
    pub fn read_prices(
        &self,
        ticker: &str,
        limit: Option<usize>,
    ) -> Result<Option<Vec<PriceRecord>>, WarehouseError> {
        let connection = self.manager.acquire()?;
        if read_snapshot(&connection, ticker)?.is_none() {
            return Ok(None);
        }

        let rows = match limit {
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let mut statement = connection.prepare(
                    "SELECT CAST(date AS VARCHAR), open, high, low, close FROM ( \
                         SELECT date, open, high, low, close FROM price_history \
                         WHERE ticker = ? ORDER BY date DESC LIMIT ? \
                     ) ORDER BY date ASC",
                )?;
                let mapped = statement.query_map(params![ticker, limit], read_price_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut statement = connection.prepare(
                    "SELECT CAST(date AS VARCHAR), open, high, low, close FROM price_history \
                     WHERE ticker = ? ORDER BY date ASC",
                )?;
                let mapped = statement.query_map(params![ticker], read_price_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Some(rows))
    }

    /// Snapshot metadata for `ticker`, or `None` when it was never cached.
    pub fn snapshot(&self, ticker: &str) -> Result<Option<SnapshotRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        read_snapshot(&connection, ticker)
    }

    /// Tickers with a cached snapshot, sorted.
    pub fn cached_tickers(&self) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement =
            connection.prepare("SELECT ticker FROM price_snapshots ORDER BY ticker")?;
        let tickers = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickers)
    }
}

fn read_price_row(row: &::duckdb::Row<'_>) -> Result<PriceRecord, ::duckdb::Error> {
    Ok(PriceRecord {
        date: row.get(0)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
    })
}

fn read_snapshot(
    connection: &Connection,
    ticker: &str,
) -> Result<Option<SnapshotRecord>, WarehouseError> {
    let mut statement = connection.prepare(
        "SELECT ticker, row_count, CAST(first_date AS VARCHAR), CAST(last_date AS VARCHAR), \
                source, CAST(refreshed_at AS VARCHAR) \
         FROM price_snapshots WHERE ticker = ?",
    )?;
    let mut rows = statement.query(params![ticker])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    Ok(Some(SnapshotRecord {
        ticker: row.get(0)?,
        row_count: row.get(1)?,
        first_date: row.get(2)?,
        last_date: row.get(3)?,
        source: row.get(4)?,
        refreshed_at: row.get(5)?,
    }))
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Warehouse) {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig {
            db_path: temp.path().join("cache").join("prices.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open");
        (temp, warehouse)
    }

    fn record(date: &str, close: f64) -> PriceRecord {
        PriceRecord {
            date: date.to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
        }
    }

    #[test]
    fn unknown_ticker_reads_as_none() {
        let (_temp, warehouse) = open_temp();
        assert!(warehouse.read_prices("IBM", None).expect("read").is_none());
        assert!(warehouse.snapshot("IBM").expect("snapshot").is_none());
    }

    #[test]
    fn replace_discards_previous_rows() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .replace_prices(
                "IBM",
                "test",
                &[record("2024-01-02", 10.0), record("2024-01-03", 11.0)],
            )
            .expect("first replace");
        let written = warehouse
            .replace_prices("IBM", "test", &[record("2024-01-04", 12.0)])
            .expect("second replace");
        assert_eq!(written, 1);

        let rows = warehouse.read_prices("IBM", None).expect("read").expect("cached");
        assert_eq!(rows, vec![record("2024-01-04", 12.0)]);
    }

    #[test]
    fn limited_read_returns_latest_rows_ascending() {
        let (_temp, warehouse) = open_temp();
        let rows = [
            record("2024-01-05", 13.0),
            record("2024-01-02", 10.0),
            record("2024-01-04", 12.0),
            record("2024-01-03", 11.0),
        ];
        warehouse.replace_prices("IBM", "test", &rows).expect("replace");

        let latest = warehouse
            .read_prices("IBM", Some(2))
            .expect("read")
            .expect("cached");
        let dates: Vec<&str> = latest.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-04", "2024-01-05"]);
    }

    #[test]
    fn tickers_are_isolated_and_case_sensitive() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .replace_prices("abc", "test", &[record("2024-01-02", 1.0)])
            .expect("lower");
        warehouse
            .replace_prices("ABC", "test", &[record("2024-01-02", 2.0), record("2024-01-03", 3.0)])
            .expect("upper");

        let lower = warehouse.read_prices("abc", None).expect("read").expect("cached");
        assert_eq!(lower.len(), 1);
        assert_eq!(
            warehouse.cached_tickers().expect("tickers"),
            vec!["ABC".to_string(), "abc".to_string()]
        );
    }

    #[test]
    fn snapshot_tracks_span_and_ingest_log() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .replace_prices("IBM", "alphavantage", &[record("2024-01-02", 1.0), record("2024-01-05", 2.0)])
            .expect("replace");
        warehouse
            .replace_prices("IBM", "alphavantage", &[record("2024-01-08", 3.0)])
            .expect("replace again");

        let snapshot = warehouse.snapshot("IBM").expect("snapshot").expect("exists");
        assert_eq!(snapshot.row_count, 1);
        assert_eq!(snapshot.first_date.as_deref(), Some("2024-01-08"));
        assert_eq!(snapshot.last_date.as_deref(), Some("2024-01-08"));
        assert_eq!(snapshot.source, "alphavantage");

        let connection = warehouse.manager.acquire().expect("connection");
        let log_rows: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM ingest_log WHERE ticker = 'IBM'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(log_rows, 2);
    }

    #[test]
    fn ticker_values_are_bound_as_parameters() {
        let (_temp, warehouse) = open_temp();
        let hostile = r#"IBM'; DROP TABLE price_history; --"#;
        warehouse
            .replace_prices(hostile, "test", &[record("2024-01-02", 1.0)])
            .expect("replace");

        let rows = warehouse.read_prices(hostile, None).expect("read").expect("cached");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn invalid_date_rolls_back_the_whole_snapshot() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .replace_prices("IBM", "test", &[record("2024-01-02", 1.0)])
            .expect("seed");

        let result =
            warehouse.replace_prices("IBM", "test", &[record("2024-01-03", 2.0), record("not-a-date", 3.0)]);
        assert!(result.is_err());

        let rows = warehouse.read_prices("IBM", None).expect("read").expect("cached");
        assert_eq!(rows, vec![record("2024-01-02", 1.0)]);
    }
}
