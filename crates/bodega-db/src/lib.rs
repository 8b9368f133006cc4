//! # bodega-db: Blob Cache for Bodega POS
//!
//! Persists the terminal's in-memory stores to SQLite so a restart picks up
//! where the terminal left off.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bodega POS Data Flow                             │
//! │                                                                         │
//! │  Terminal::save() / Terminal::load()                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bodega-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ CacheRepo     │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ save / load   │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ BlobMigration │    │ 001_cache_   │  │   │
//! │  │   └───────────────┘    └───────────────┘    │   blobs.sql  │  │   │
//! │  │                                              └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  cache_blobs: auth │ cart │ offers │ products │ sales           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded SQL migrations
//! - [`error`] - Database error types
//! - [`repository`] - Versioned blob cache
//! - [`seed`] - Demo store dataset
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bodega_db::{BlobKey, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bodega.db")).await?;
//! db.cache().save(BlobKey::Products, &catalog).await?;
//! let catalog: Option<Catalog> = db.cache().load(BlobKey::Products).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::cache::{BlobKey, BlobMigration, CacheRepository, NoMigrations, CURRENT_SCHEMA_VERSION};
