//! # Blob Cache Repository
//!
//! Saves and loads whole terminal stores as versioned JSON documents.
//!
//! ## Load Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load::<T>(key)                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT schema_version, payload FROM cache_blobs WHERE key = ?         │
//! │       │                                                                 │
//! │       ├── no row ─────────────────────────────► Ok(None)                │
//! │       │                                                                 │
//! │       ├── version > current ──────────────────► Err(UnsupportedVersion) │
//! │       │                                                                 │
//! │       ├── version < current                                             │
//! │       │     hook.upgrade(v → v+1) until current                         │
//! │       │     write the upgraded payload back                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  serde_json::from_value::<T>(payload) ────────► Ok(Some(T))             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

// =============================================================================
// Keys and Versions
// =============================================================================

/// Every store the terminal persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKey {
    /// Directory, sessions and current login.
    Auth,
    /// Current cart plus parked carts per employee.
    Cart,
    Offers,
    /// Product list and category list.
    Products,
    /// Sales and refunds.
    Sales,
}

impl BlobKey {
    pub const ALL: [BlobKey; 5] = [
        BlobKey::Auth,
        BlobKey::Cart,
        BlobKey::Offers,
        BlobKey::Products,
        BlobKey::Sales,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKey::Auth => "auth",
            BlobKey::Cart => "cart",
            BlobKey::Offers => "offers",
            BlobKey::Products => "products",
            BlobKey::Sales => "sales",
        }
    }

    /// Payload version this build writes for the key.
    pub fn current_version(&self) -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version stamped on every blob written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Upgrade Hook
// =============================================================================

/// Upgrades an old payload one version at a time.
///
/// `upgrade` receives a payload at `from_version` and must return it at
/// `from_version + 1`. Returning `Err` aborts the load with
/// [`DbError::MigrationHookFailed`].
pub trait BlobMigration: Send + Sync {
    fn upgrade(&self, key: BlobKey, from_version: u32, payload: Value) -> Result<Value, String>;
}

/// Hook for builds that have never changed a payload shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMigrations;

impl BlobMigration for NoMigrations {
    fn upgrade(&self, _key: BlobKey, from_version: u32, _payload: Value) -> Result<Value, String> {
        Err(format!("no upgrade path from version {from_version}"))
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Raw row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct StoredBlob {
    pub key: String,
    pub schema_version: i64,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository for the `cache_blobs` table.
#[derive(Clone)]
pub struct CacheRepository {
    pool: SqlitePool,
    migration: Arc<dyn BlobMigration>,
}

impl fmt::Debug for CacheRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRepository").finish_non_exhaustive()
    }
}

impl CacheRepository {
    /// Creates a repository with no upgrade hook.
    pub fn new(pool: SqlitePool) -> Self {
        CacheRepository {
            pool,
            migration: Arc::new(NoMigrations),
        }
    }

    /// Replaces the upgrade hook used by [`load`](Self::load).
    pub fn with_migration(mut self, migration: Arc<dyn BlobMigration>) -> Self {
        self.migration = migration;
        self
    }

    /// Writes `value` under `key` at the current schema version.
    pub async fn save<T: Serialize>(&self, key: BlobKey, value: &T) -> DbResult<()> {
        let payload = serde_json::to_string(value)?;
        self.write(key, key.current_version(), &payload).await?;
        debug!(key = %key, bytes = payload.len(), "Blob saved");
        Ok(())
    }

    /// Reads the blob under `key`, upgrading it first if it is older than
    /// this build. A missing blob is `Ok(None)`.
    pub async fn load<T: DeserializeOwned>(&self, key: BlobKey) -> DbResult<Option<T>> {
        let Some(stored) = self.raw(key).await? else {
            debug!(key = %key, "No blob stored");
            return Ok(None);
        };

        let supported = key.current_version();
        let found = u32::try_from(stored.schema_version).map_err(|_| DbError::UnsupportedVersion {
            key: key.to_string(),
            found: u32::MAX,
            supported,
        })?;
        if found > supported {
            return Err(DbError::UnsupportedVersion {
                key: key.to_string(),
                found,
                supported,
            });
        }

        let mut payload: Value = serde_json::from_str(&stored.payload)?;
        if found < supported {
            for version in found..supported {
                payload = self.migration.upgrade(key, version, payload).map_err(|reason| {
                    DbError::MigrationHookFailed {
                        key: key.to_string(),
                        from_version: version,
                        reason,
                    }
                })?;
            }
            self.write(key, supported, &payload.to_string()).await?;
            info!(key = %key, from = found, to = supported, "Blob upgraded");
        }

        Ok(Some(serde_json::from_value(payload)?))
    }

    /// The row under `key` without decoding.
    pub async fn raw(&self, key: BlobKey) -> DbResult<Option<StoredBlob>> {
        let row = sqlx::query_as::<_, StoredBlob>(
            r#"
            SELECT key, schema_version, payload, updated_at
            FROM cache_blobs
            WHERE key = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Deletes the blob; returns whether one existed.
    pub async fn delete(&self, key: BlobKey) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM cache_blobs WHERE key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether anything is stored under `key`.
    pub async fn exists(&self, key: BlobKey) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_blobs WHERE key = ?1")
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn write(&self, key: BlobKey, version: u32, payload: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_blobs (key, schema_version, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                schema_version = excluded.schema_version,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(i64::from(version))
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Drawer {
        owner: String,
        coins: Vec<i64>,
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn put_raw(db: &Database, key: BlobKey, version: i64, payload: &str) {
        sqlx::query(
            "INSERT INTO cache_blobs (key, schema_version, payload, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(key.as_str())
        .bind(version)
        .bind(payload)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
    }

    /// v0 stored the owner under "employee".
    struct RenameEmployee;

    impl BlobMigration for RenameEmployee {
        fn upgrade(&self, _key: BlobKey, from_version: u32, mut payload: Value) -> Result<Value, String> {
            if from_version != 0 {
                return Err("unexpected version".to_string());
            }
            let obj = payload.as_object_mut().ok_or("payload is not an object")?;
            let owner = obj.remove("employee").ok_or("missing employee")?;
            obj.insert("owner".to_string(), owner);
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn test_missing_blob_is_none() {
        let db = db().await;
        let loaded: Option<Drawer> = db.cache().load(BlobKey::Cart).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_overwrites() {
        let db = db().await;
        let cache = db.cache();

        let first = Drawer { owner: "1".to_string(), coins: vec![10, 20] };
        cache.save(BlobKey::Cart, &first).await.unwrap();
        let second = Drawer { owner: "2".to_string(), coins: vec![] };
        cache.save(BlobKey::Cart, &second).await.unwrap();

        let loaded: Drawer = cache.load(BlobKey::Cart).await.unwrap().unwrap();
        assert_eq!(loaded, second);

        let raw = cache.raw(BlobKey::Cart).await.unwrap().unwrap();
        assert_eq!(raw.schema_version, i64::from(CURRENT_SCHEMA_VERSION));
        assert!(!cache.exists(BlobKey::Sales).await.unwrap());
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let db = db().await;
        put_raw(&db, BlobKey::Offers, 99, "{}").await;

        let result = db.cache().load::<Drawer>(BlobKey::Offers).await;
        assert!(matches!(
            result,
            Err(DbError::UnsupportedVersion { found: 99, supported: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_older_version_without_hook_fails() {
        let db = db().await;
        put_raw(&db, BlobKey::Auth, 0, r#"{"employee":"1","coins":[]}"#).await;

        let result = db.cache().load::<Drawer>(BlobKey::Auth).await;
        assert!(matches!(
            result,
            Err(DbError::MigrationHookFailed { from_version: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_older_version_is_upgraded_and_written_back() {
        let db = db().await;
        put_raw(&db, BlobKey::Auth, 0, r#"{"employee":"1","coins":[5]}"#).await;

        let cache = db.cache().with_migration(Arc::new(RenameEmployee));
        let loaded: Drawer = cache.load(BlobKey::Auth).await.unwrap().unwrap();
        assert_eq!(loaded, Drawer { owner: "1".to_string(), coins: vec![5] });

        let raw = cache.raw(BlobKey::Auth).await.unwrap().unwrap();
        assert_eq!(raw.schema_version, 1);
        // Second load needs no hook.
        let again: Drawer = db.cache().load(BlobKey::Auth).await.unwrap().unwrap();
        assert_eq!(again, loaded);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_serialization_error() {
        let db = db().await;
        put_raw(&db, BlobKey::Products, 1, "{not json").await;

        let result = db.cache().load::<Drawer>(BlobKey::Products).await;
        assert!(matches!(result, Err(DbError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = db().await;
        let cache = db.cache();
        cache.save(BlobKey::Sales, &Drawer { owner: "x".to_string(), coins: vec![] }).await.unwrap();

        assert!(cache.delete(BlobKey::Sales).await.unwrap());
        assert!(!cache.delete(BlobKey::Sales).await.unwrap());
    }
}
