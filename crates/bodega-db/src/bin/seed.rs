//! # Seed Data Generator
//!
//! Populates the cache store with the demo store: catalog, offers and
//! employees.
//!
//! ## Usage
//! ```bash
//! # Seed ./bodega_dev.db
//! cargo run -p bodega-db --bin seed
//!
//! # Specify database path
//! cargo run -p bodega-db --bin seed -- --db ./data/bodega.db
//!
//! # Replace existing data (also clears carts and sales)
//! cargo run -p bodega-db --bin seed -- --force
//! ```

use std::env;
use std::sync::Arc;

use anyhow::Context;
use bodega_core::auth::{AuthManager, AuthSettings};
use bodega_core::clock::{Clock, SystemClock};
use bodega_db::seed::{demo_catalog, demo_offers, demo_users, DEMO_PASSWORD};
use bodega_db::{BlobKey, Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bodega_dev.db");
    let mut force = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                println!("Bodega POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bodega_dev.db)");
                println!("  -f, --force        Overwrite existing data");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bodega POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("opening cache database")?;
    let cache = db.cache();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if cache.exists(BlobKey::Products).await? && !force {
        println!("⚠ Database already has a catalog");
        println!("  Skipping seed to avoid overwriting it.");
        println!("  Run with --force to replace it.");
        return Ok(());
    }

    let clock = Arc::new(SystemClock);
    let now = clock.now();

    let catalog = demo_catalog(now).context("building demo catalog")?;
    let offers = demo_offers(&catalog, now).context("building demo offers")?;
    let mut auth = AuthManager::new(AuthSettings::default(), clock);
    demo_users(&mut auth).context("hashing demo passwords")?;

    cache.save(BlobKey::Products, &catalog).await?;
    cache.save(BlobKey::Offers, &offers).await?;
    cache.save(BlobKey::Auth, &auth.snapshot()).await?;
    if force {
        cache.delete(BlobKey::Cart).await?;
        cache.delete(BlobKey::Sales).await?;
    }

    println!();
    println!("✓ {} products in {} categories", catalog.products().len(), catalog.categories().len());
    println!("✓ {} offers", offers.offers().len());
    println!("✓ {} employees (password {})", auth.users().len(), DEMO_PASSWORD);
    for user in auth.users() {
        println!("    {}  {:<14} {:?}", user.code, user.name, user.role);
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
