//! Database manager implementation
//!
//! This module provides database connection management with:
//! - SQLite connection pool using r2d2
//! - Async wrapper for database operations

use crate::core::error::{AppError, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

/// Database manager with connection pool
#[derive(Clone)]
pub struct DatabaseManager {
    pool: Pool<SqliteConnectionManager>,
    db_path: PathBuf,
}

impl DatabaseManager {
    /// Create a new DatabaseManager with the specified database path and pool size.
    ///
    /// `busy_timeout` bounds both SQLite lock waits and pool checkout.
    pub fn new(db_path: &Path, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::ConfigError(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(move |conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(busy_timeout)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(busy_timeout)
            .build(manager)?;

        let manager = Self {
            pool,
            db_path: db_path.to_path_buf(),
        };

        manager.migrate()?;

        Ok(manager)
    }

    /// Create a new DatabaseManager with an in-memory database for testing
    pub fn new_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                Ok(())
            });

        // Every in-memory connection is its own database, so the pool must
        // hold exactly one connection and never recycle it.
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)?;

        let manager = Self {
            pool,
            db_path: PathBuf::from(":memory:"),
        };

        manager.migrate()?;

        Ok(manager)
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Execute a database operation on the blocking thread pool
    pub async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError::TaskError(format!("Database task panicked: {}", e)))?
    }

    /// Execute database migrations
    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        crate::db::migrations::run_migrations(&mut conn)
    }

    /// Get the database file path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get the current pool size
    pub fn pool_size(&self) -> u32 {
        self.pool.max_size()
    }
}
