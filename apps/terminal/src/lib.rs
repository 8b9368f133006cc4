//! # Bodega Terminal Library
//!
//! The checkout terminal: configuration, the [`terminal::Terminal`] service
//! and the command shell that drives it.
//!
//! ## Module Organization
//! ```text
//! bodega_terminal/
//! ├── lib.rs          ◄─── You are here (logging & startup)
//! ├── config.rs       ◄─── terminal.toml + BODEGA_* overrides
//! ├── error.rs        ◄─── ApiError shown to the cashier
//! ├── terminal.rs     ◄─── Login, cart, checkout, refunds, persistence
//! ├── receipt.rs      ◄─── Printed receipt
//! └── shell.rs        ◄─── stdin commands + idle watcher
//! ```

pub mod config;
pub mod error;
pub mod receipt;
pub mod shell;
pub mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bodega_core::SystemClock;

use config::TerminalConfig;
use terminal::Terminal;

/// Runs the terminal until the shell exits.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Terminal Startup                                  │
/// │                                                                         │
/// │  1. Initialize Logging ───────────────────────────────────────────────► │
/// │     • tracing-subscriber with env filter, written to stderr             │
/// │     • Default: INFO, can be overridden with RUST_LOG                    │
/// │                                                                         │
/// │  2. Load Configuration ───────────────────────────────────────────────► │
/// │     • terminal.toml, then BODEGA_* environment, then validation         │
/// │                                                                         │
/// │  3. Open Cache Database ──────────────────────────────────────────────► │
/// │     • SQLite with WAL mode, pending migrations applied                  │
/// │     • Every store restored from its blob                                │
/// │                                                                         │
/// │  4. Run Shell ────────────────────────────────────────────────────────► │
/// │     • Commands from stdin, idle check every poll interval               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_tracing();

    let config = TerminalConfig::load(config_path).context("loading terminal configuration")?;
    info!(
        terminal_id = %config.terminal_id,
        database = %config.database_path.display(),
        "Starting Bodega terminal"
    );

    let terminal = Terminal::open(config, Arc::new(SystemClock))
        .await
        .context("opening terminal state")?;

    shell::run_shell(terminal).await
}

/// Initializes the tracing subscriber.
///
/// Logs go to stderr so they never interleave with receipts on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
