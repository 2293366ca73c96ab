//! SQLite pool setup for the library store.
//!
//! [`create_pool`] opens (or creates) the database file, switches it to WAL,
//! applies the embedded migrations and runs a trivial query before handing the
//! pool back. Every error on that path is a storage failure, which callers use
//! to decide whether to fall back to memory.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("muse.db")).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const MEMORY_URL: &str = "sqlite::memory:";

/// Pool tuning for one SQLite database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// `None` keeps connections for the life of the pool
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// File-backed database at `path`, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: format!("sqlite:{}", path.into().display()),
            max_connections: 4,
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            ..Self::in_memory()
        }
    }

    /// Private in-memory database.
    ///
    /// Every SQLite connection to `:memory:` sees its own database, so the
    /// pool is pinned to one connection that never expires.
    pub fn in_memory() -> Self {
        Self {
            database_url: MEMORY_URL.to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            statement_cache_capacity: 100,
        }
    }

    /// On-disk when a path is configured, memory otherwise.
    pub fn for_path(path: Option<&PathBuf>) -> Self {
        path.map_or_else(Self::in_memory, |path| Self::new(path.clone()))
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url == MEMORY_URL
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        if !self.is_in_memory() {
            self.max_connections = max;
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open a migrated, verified pool.
///
/// # Errors
///
/// Fails with [`LibraryError::Database`] or [`LibraryError::Migration`]; both
/// satisfy [`LibraryError::is_storage_failure`].
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening library database"
    );

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(LibraryError::Database)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .statement_cache_capacity(config.statement_cache_capacity);

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open library database");
            LibraryError::Database(e)
        })?;

    migrate(&pool).await?;
    ping(&pool).await?;

    debug!(connections = pool.size(), "Library database ready");
    Ok(pool)
}

/// In-memory pool with the schema applied.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Schema migration failed");
        LibraryError::Migration(e.to_string())
    })?;
    debug!("Schema up to date");
    Ok(())
}

async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            warn!(error = %e, "Library database did not answer");
            LibraryError::Database(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_answers() {
        let pool = create_test_pool().await.unwrap();
        assert!(ping(&pool).await.is_ok());
    }

    #[test]
    fn memory_pool_stays_single_connection() {
        let config = DatabaseConfig::in_memory()
            .min_connections(1)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .statement_cache_capacity(16);

        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.statement_cache_capacity, 16);
        assert!(config.max_lifetime.is_none());
    }

    #[test]
    fn file_config_takes_builder_values() {
        let config = DatabaseConfig::new("/tmp/muse.db").max_connections(8);
        assert_eq!(config.max_connections, 8);
        assert!(!config.is_in_memory());
        assert!(config.max_lifetime.is_some());
    }

    #[test]
    fn optional_path_selects_backend() {
        assert!(DatabaseConfig::for_path(None).is_in_memory());

        let path = PathBuf::from("/tmp/muse.db");
        assert_eq!(
            DatabaseConfig::for_path(Some(&path)).database_url,
            "sqlite:/tmp/muse.db"
        );
    }

    #[tokio::test]
    async fn schema_has_all_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["songs", "playlists", "playlist_songs"] {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn later_columns_default_for_old_rows() {
        let pool = create_test_pool().await.unwrap();

        sqlx::query(
            "INSERT INTO songs (id, title, artist, album, duration, audio, created_at)
             VALUES ('legacy', 'Old', '', '', 10.0, x'00', 1)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let row: (Option<String>, bool) =
            sqlx::query_as("SELECT lyrics, liked FROM songs WHERE id = 'legacy'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(row, (None, false));
    }

    #[tokio::test]
    async fn missing_directory_is_a_storage_failure() {
        let config = DatabaseConfig::new("/nonexistent-dir/deeper/muse.db")
            .acquire_timeout(Duration::from_secs(2));
        let err = create_pool(config).await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
