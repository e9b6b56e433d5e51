//! `DuckDB` connection pool management.
//!
//! A single database instance is opened per warehouse; pooled connections are
//! cheap clones of that instance, so every handle observes the same catalog and
//! the file lock is taken exactly once per process.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database file and create a pool around it.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_pool_size` - Maximum number of idle connections to keep
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_pool_size: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(db_path.as_path())?;
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_pool_size: max_pool_size.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Acquire a connection from the pool, cloning the root handle when the
    /// pool is empty.
    ///
    /// # Errors
    /// Returns an error if a new handle cannot be cloned or configured.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                let root = self
                    .inner
                    .root
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let connection = root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection is only taken on drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection is only taken on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.pool.max_pool_size {
            idle.push(connection);
        }
    }
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
