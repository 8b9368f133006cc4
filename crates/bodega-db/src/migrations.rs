//! # Database Migrations
//!
//! Embedded SQL migrations for the cache store.
//!
//! ## Two Kinds of Migration
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQL schema (this module)          Blob payloads (repository::cache)   │
//! │  ─────────────────────────         ──────────────────────────────────  │
//! │  migrations/sqlite/NNN_*.sql       schema_version column per blob      │
//! │  run once at startup               run lazily on load                  │
//! │  tracked in _sqlx_migrations       BlobMigration hook, one step at a   │
//! │                                    time up to the current version      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. Write idempotent SQL (use `IF NOT EXISTS` where possible)
//! 4. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration not yet recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(count = MIGRATOR.migrations.len(), "Cache schema up to date");
    Ok(())
}

/// Number of embedded migrations that have not been applied yet.
pub async fn pending_migrations(pool: &SqlitePool) -> DbResult<usize> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    Ok(MIGRATOR.migrations.len().saturating_sub(applied as usize))
}
