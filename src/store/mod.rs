//! SQLite-backed ledger: users, point history, events, invites and
//! registration drafts.
//!
//! All access goes through one pooled connection. Every operation that
//! touches more than one row runs inside a single transaction.

pub mod drafts;
pub mod events;
pub mod invites;
pub mod schema;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{BotError, Result};


/// Handle to the ledger database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file at `path` and bring the schema up to date
    pub async fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = Self::pool_options()
            .connect_with(options)
            .await
            .map_err(|e| BotError::DatabaseOpen {
                path: path.display().to_string(),
                source: e,
            })?;

        let store = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        schema::ensure_schema(&store.pool).await?;
        Ok(store)
    }

    /// Private in-memory database, used by tests
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            BotError::DatabaseOpen {
                path: ":memory:".to_string(),
                source: e,
            }
        })?;

        let pool = Self::pool_options()
            .connect_with(options)
            .await
            .map_err(|e| BotError::DatabaseOpen {
                path: ":memory:".to_string(),
                source: e,
            })?;

        let store = Self { pool, path: None };
        schema::ensure_schema(&store.pool).await?;
        Ok(store)
    }

    // Single connection; an in-memory database exists only inside it.
    fn pool_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    }

    /// Filesystem path of the database, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}

/// True when a sqlx error is a UNIQUE / PRIMARY KEY violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub(crate) fn to_db_id(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db_id(id: i64) -> u64 {
    id as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_open_file_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");

        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
        store.close().await;
    }

    #[test]
    fn test_db_id_conversion() {
        let snowflake = 1_234_567_890_123_456_789u64;
        assert_eq!(from_db_id(to_db_id(snowflake)), snowflake);
    }
}
