//! # Cache Database
//!
//! Opens the SQLite file that backs the blob cache.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Terminal startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← from terminal.toml / BODEGA_DATABASE_PATH        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← open file + run migrations              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.cache().load::<Catalog>(BlobKey::Products) ...                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A terminal holds very few connections: its own saves, plus the seed
//! binary when it is run against the same file. WAL mode keeps the previous
//! blob readable while a save is in flight, and the busy timeout lets the
//! two writers queue instead of failing with `SQLITE_BUSY`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cache::CacheRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the cache lives and how it is opened.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/bodega/bodega.db").busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created with its parent directory if missing.
    pub database_path: PathBuf,

    /// Default: 2
    pub max_connections: u32,

    /// How long a write waits for a competing writer.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 2,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private in-memory cache, gone when the last handle is dropped.
    pub fn in_memory() -> Self {
        DbConfig {
            // Every SQLite connection to :memory: is a separate database.
            max_connections: 1,
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the cache database. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the cache and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening cache database");

        if !config.is_in_memory() {
            ensure_parent_dir(&config.database_path)?;
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory() {
            // Keep the one connection (and with it the data) for the pool's lifetime.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Cache pool ready");

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the blob cache repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let catalog: Option<Catalog> = db.cache().load(BlobKey::Products).await?;
    /// ```
    pub fn cache(&self) -> CacheRepository {
        CacheRepository::new(self.pool.clone())
    }

    /// True once every embedded migration has been applied.
    pub async fn schema_ready(&self) -> DbResult<bool> {
        Ok(migrations::pending_migrations(&self.pool).await? == 0)
    }

    /// Closes the pool, waiting for in-flight writes.
    pub async fn close(&self) {
        info!("Closing cache database");
        self.pool.close().await;
    }
}

fn ensure_parent_dir(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.schema_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_unmigrated_database_reports_pending() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        assert!(!db.schema_ready().await.unwrap());
    }

    #[test]
    fn test_in_memory_uses_single_connection() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
        assert!(!DbConfig::new("/tmp/bodega-test.db").is_in_memory());
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("bodega-db-{}", std::process::id()));
        let path = dir.join("nested").join("bodega.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(path.exists());
        db.close().await;

        let _ = std::fs::remove_dir_all(&dir);
    }
}
