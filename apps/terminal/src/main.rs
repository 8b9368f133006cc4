//! # Bodega Terminal Entry Point
//!
//! ## Usage
//! ```bash
//! # Config from the platform config dir (or defaults)
//! bodega-terminal
//!
//! # Explicit config file
//! bodega-terminal --config ./terminal.toml
//! ```
//!
//! Seed the cache first with `cargo run -p bodega-db --bin seed`, pointing
//! `BODEGA_DATABASE_PATH` (or `database_path`) at the same file.

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Bodega POS Terminal");
                println!();
                println!("Usage: bodega-terminal [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => anyhow::bail!("Unknown option: {other}"),
        }
    }

    // The actual setup is in lib.rs for better testability
    bodega_terminal::run(config_path).await
}
