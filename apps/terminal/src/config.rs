//! # Terminal Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`BODEGA_*`)
//! 2. Config file (`terminal.toml`)
//! 3. Defaults (this file)
//!
//! ## Example `terminal.toml`
//! ```toml
//! terminal_id = "CAJA-01"
//! store_name = "Bodega Doña Rosa"
//! igv_rate_bps = 1800
//! idle_timeout_secs = 1200
//! database_path = "/var/lib/bodega/bodega.db"
//! ```

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use bodega_core::validation::validate_tax_rate_bps;
use bodega_core::{Money, TaxRate};

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Terminal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Identifies this checkout in sessions and on receipts.
    pub terminal_id: String,

    /// Printed at the top of every receipt.
    pub store_name: String,

    /// Currency symbol for display.
    pub currency_symbol: String,

    /// IGV in basis points. 1800 = 18%.
    pub igv_rate_bps: u32,

    /// Seconds without activity before the cashier is logged out.
    pub idle_timeout_secs: i64,

    /// How often the idle watcher checks the session.
    pub idle_poll_interval_secs: u64,

    /// Stock at or below this shows up in the low-stock list.
    pub low_stock_threshold: i64,

    /// Store's offset from UTC in hours, for receipts and daily reports.
    pub utc_offset_hours: i32,

    /// SQLite cache file.
    pub database_path: PathBuf,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            terminal_id: "CAJA-01".to_string(),
            store_name: "Bodega POS".to_string(),
            currency_symbol: "S/".to_string(),
            igv_rate_bps: bodega_core::DEFAULT_IGV_RATE_BPS,
            idle_timeout_secs: bodega_core::DEFAULT_IDLE_TIMEOUT_SECS,
            idle_poll_interval_secs: 1,
            low_stock_threshold: bodega_core::DEFAULT_LOW_STOCK_THRESHOLD,
            utc_offset_hours: -5,
            database_path: default_database_path(),
        }
    }
}

impl TerminalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, or `terminal.toml` in the platform config dir)
    /// 3. Environment variables
    pub fn load(path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = TerminalConfig::default();

        if let Some(path) = path.or_else(default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Rejects settings the terminal cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.terminal_id.trim().is_empty() {
            return Err(ConfigError::Invalid("terminal_id must not be empty".into()));
        }
        validate_tax_rate_bps(self.igv_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.idle_timeout_secs <= 0 {
            return Err(ConfigError::Invalid(
                "idle_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.idle_poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "idle_poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "low_stock_threshold must not be negative".into(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Invalid(
                "utc_offset_hours must be between -12 and 14".into(),
            ));
        }
        Ok(())
    }

    /// Applies `BODEGA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any lookup; unparsable values are ignored
    /// with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("BODEGA_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal id from environment");
            self.terminal_id = id;
        }
        if let Some(name) = lookup("BODEGA_STORE_NAME") {
            self.store_name = name;
        }
        if let Some(symbol) = lookup("BODEGA_CURRENCY_SYMBOL") {
            self.currency_symbol = symbol;
        }
        if let Some(path) = lookup("BODEGA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        parse_override(&lookup, "BODEGA_IGV_RATE_BPS", &mut self.igv_rate_bps);
        parse_override(&lookup, "BODEGA_IDLE_TIMEOUT_SECS", &mut self.idle_timeout_secs);
        parse_override(
            &lookup,
            "BODEGA_IDLE_POLL_INTERVAL_SECS",
            &mut self.idle_poll_interval_secs,
        );
        parse_override(&lookup, "BODEGA_LOW_STOCK_THRESHOLD", &mut self.low_stock_threshold);
        parse_override(&lookup, "BODEGA_UTC_OFFSET_HOURS", &mut self.utc_offset_hours);
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn igv_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.igv_rate_bps)
    }

    /// The store's fixed offset; UTC if the configured hours are out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Formats an amount with the configured symbol, e.g. `S/ 4.70`.
    pub fn format_money(&self, amount: Money) -> String {
        format!(
            "{}{} {}.{:02}",
            if amount.is_negative() { "-" } else { "" },
            self.currency_symbol,
            amount.soles().abs(),
            amount.cents_part()
        )
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(variable = name, value = %raw, "Ignoring unparsable environment override"),
    }
}

/// `terminal.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("pe", "bodega", "pos").map(|dirs| dirs.config_dir().join("terminal.toml"))
}

/// `bodega.db` in the platform data directory, or the working directory.
fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("pe", "bodega", "pos")
        .map(|dirs| dirs.data_dir().join("bodega.db"))
        .unwrap_or_else(|| PathBuf::from("bodega.db"))
}
