//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/socialscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/socialscope/` (~/.config/socialscope/)
//! - Data: `$XDG_DATA_HOME/socialscope/` (~/.local/share/socialscope/)
//! - State/Logs: `$XDG_STATE_HOME/socialscope/` (~/.local/state/socialscope/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where the social dataset lives
    #[serde(default)]
    pub datastore: DatastoreConfig,

    /// Capacity planning inputs for the growth projection
    #[serde(default)]
    pub capacity: CapacityConfig,

    /// Report and chart output
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Datastore location
#[derive(Debug, Deserialize, Default)]
pub struct DatastoreConfig {
    /// Path to the SQLite dataset (defaults to the data directory)
    pub path: Option<PathBuf>,
}

/// Capacity planning configuration
#[derive(Debug, Deserialize)]
pub struct CapacityConfig {
    /// Servers currently serving the platform
    #[serde(default = "default_current_servers")]
    pub current_servers: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            current_servers: default_current_servers(),
        }
    }
}

fn default_current_servers() -> u32 {
    16
}

/// Output format for chart files
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    /// Static SVG image
    #[default]
    Svg,
    /// Chart table as JSON for an external renderer
    Json,
}

impl ChartFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ChartFormat::Svg => "svg",
            ChartFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ChartFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "svg" => Ok(ChartFormat::Svg),
            "json" => Ok(ChartFormat::Json),
            other => Err(Error::Config(format!(
                "unknown chart format '{}', expected svg or json",
                other
            ))),
        }
    }
}

/// Report and chart configuration
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// Number of ranked rows shown in detail
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Whether chart files are written
    #[serde(default = "default_charts")]
    pub charts: bool,

    /// Directory for chart files (defaults to the data directory)
    pub chart_dir: Option<PathBuf>,

    /// Chart file format
    #[serde(default)]
    pub chart_format: ChartFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            charts: default_charts(),
            chart_dir: None,
            chart_format: ChartFormat::default(),
        }
    }
}

fn default_top_n() -> usize {
    3
}

fn default_charts() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.capacity.current_servers == 0 {
            return Err(Error::Config(
                "capacity.current_servers must be at least 1".to_string(),
            ));
        }
        if self.report.top_n == 0 {
            return Err(Error::Config("report.top_n must be at least 1".to_string()));
        }
        if self.logging.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved datastore path: configured path or the default location
    pub fn datastore_path(&self) -> PathBuf {
        self.datastore
            .path
            .clone()
            .unwrap_or_else(Self::default_datastore_path)
    }

    /// Resolved chart directory: configured directory or the default location
    pub fn chart_dir(&self) -> PathBuf {
        self.report
            .chart_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("charts"))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/socialscope/config.toml` (~/.config/socialscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("socialscope").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/socialscope/` (~/.local/share/socialscope/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("socialscope")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/socialscope/` (~/.local/state/socialscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("socialscope")
    }

    /// Returns the default dataset path
    ///
    /// `$XDG_DATA_HOME/socialscope/database.sqlite`
    pub fn default_datastore_path() -> PathBuf {
        Self::data_dir().join("database.sqlite")
    }

    /// Ensure XDG env vars are set to the standard defaults when missing.
    ///
    /// Called by the CLI before anything reads these variables so that every
    /// path resolves the same way for the rest of the process.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
