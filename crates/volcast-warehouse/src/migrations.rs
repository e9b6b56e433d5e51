use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    // price_history carries no PRIMARY KEY: a replace deletes and re-inserts the
    // same (ticker, date) pairs inside one transaction, which DuckDB's eager
    // unique-constraint checking rejects. Dates are unique per PriceSeries.
    Migration {
        version: "0001_price_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS price_history (
    ticker TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS price_snapshots (
    ticker TEXT PRIMARY KEY,
    row_count BIGINT NOT NULL,
    first_date DATE,
    last_date DATE,
    source TEXT NOT NULL,
    refreshed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ingest_log (
    request_id TEXT NOT NULL,
    ticker TEXT NOT NULL,
    source TEXT NOT NULL,
    row_count BIGINT NOT NULL,
    status TEXT NOT NULL,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_price_history_ticker_date ON price_history(ticker, date);
CREATE INDEX IF NOT EXISTS idx_ingest_log_ticker_ts ON ingest_log(ticker, timestamp);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}
