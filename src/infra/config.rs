//! Configuration loading from TOML files
//!
//! Config file is selected via `--config <path>` (default: config/dev.toml).
//! Every section is optional; missing keys fall back to the defaults below.

use crate::domain::types::{Tariff, TariffTable};
use crate::services::lot_manager::MAX_TOTAL_SPOTS;
use anyhow::{bail, Context};
use chrono::format::{Item, StrftimeItems};
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct LotSection {
    #[serde(default = "default_total_spots")]
    pub total_spots: u32,
    /// Grace period billed at zero
    #[serde(default = "default_free_minutes")]
    pub free_minutes: u32,
}

impl Default for LotSection {
    fn default() -> Self {
        Self { total_spots: default_total_spots(), free_minutes: default_free_minutes() }
    }
}

fn default_total_spots() -> u32 {
    10
}

fn default_free_minutes() -> u32 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// strftime pattern for ticket timestamps
    #[serde(default = "default_date_time_format")]
    pub date_time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { date_time_format: default_date_time_format() }
    }
}

fn default_date_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_http_bind_address(), port: default_http_port() }
    }
}

fn default_http_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Interval between metrics summary log lines (0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

fn default_tariffs() -> TariffTable {
    let mut tariffs = TariffTable::new();
    tariffs.insert("hourly", Tariff::new(dec!(1), dec!(10.00)));
    tariffs.insert("daily", Tariff::new(dec!(24), dec!(100.00)));
    tariffs
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub lot: LotSection,
    #[serde(default)]
    pub display: DisplayConfig,
    /// A present table replaces the default tariffs entirely
    #[serde(default = "default_tariffs")]
    pub tariffs: TariffTable,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    total_spots: u32,
    free_minutes: u32,
    tariffs: TariffTable,
    date_time_format: String,
    http_bind_address: String,
    http_port: u16,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_spots: default_total_spots(),
            free_minutes: default_free_minutes(),
            tariffs: default_tariffs(),
            date_time_format: default_date_time_format(),
            http_bind_address: default_http_bind_address(),
            http_port: default_http_port(),
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml_str(&content, &path.display().to_string())
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration text; `source` is kept for display
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("Failed to parse TOML")?;

        let config = Self {
            total_spots: toml_config.lot.total_spots,
            free_minutes: toml_config.lot.free_minutes,
            tariffs: toml_config.tariffs,
            date_time_format: toml_config.display.date_time_format,
            http_bind_address: toml_config.http.bind_address,
            http_port: toml_config.http.port,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: source.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.total_spots == 0 || self.total_spots > MAX_TOTAL_SPOTS {
            bail!("lot.total_spots must be between 1 and {}", MAX_TOTAL_SPOTS);
        }
        self.tariffs.validate()?;
        validate_date_time_format(&self.date_time_format)?;
        Ok(())
    }

    pub fn total_spots(&self) -> u32 {
        self.total_spots
    }

    pub fn free_minutes(&self) -> u32 {
        self.free_minutes
    }

    pub fn tariffs(&self) -> &TariffTable {
        &self.tariffs
    }

    pub fn date_time_format(&self) -> &str {
        &self.date_time_format
    }

    pub fn http_bind_address(&self) -> &str {
        &self.http_bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

/// Reject strftime patterns chrono cannot render
fn validate_date_time_format(format: &str) -> anyhow::Result<()> {
    if format.is_empty() {
        bail!("display.date_time_format must not be empty");
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("display.date_time_format '{}' is not a valid strftime pattern", format);
    }
    Ok(())
}
