//! Configuration loading and database path resolution
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `LSQ_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/lsq/config.toml`), if present
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicitly named file
//! (CLI or environment) that cannot be read or parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "LSQ_CONFIG";

/// Environment variable overriding the manual queue database path
pub const DB_PATH_ENV_VAR: &str = "LSQ_DB_PATH";

/// Queue orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Manual queue database file (None = platform default)
    pub db_path: Option<PathBuf>,

    /// Sub-track position sampling interval while playing
    pub progress_interval_ms: u64,

    /// Buffered QueueEvents per subscriber
    pub event_bus_capacity: usize,

    /// Buffered player notifications per listener
    pub player_event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            progress_interval_ms: 1000,
            event_bus_capacity: 100,
            player_event_capacity: 256,
        }
    }
}

impl QueueConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QueueConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the configuration following the documented priority order
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        if let Some(path) = default_config_file() {
            if path.exists() {
                return Self::load(&path);
            }
            debug!("No config file at {}, using defaults", path.display());
        }

        Ok(Self::default())
    }

    /// Reject values that would stall the sampler or the channels
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(Error::Config("progress_interval_ms must be greater than 0".to_string()));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be greater than 0".to_string()));
        }
        if self.player_event_capacity == 0 {
            return Err(Error::Config("player_event_capacity must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Resolve the manual queue database path
///
/// Priority: CLI argument, `LSQ_DB_PATH`, config file, platform default.
pub fn resolve_db_path(cli_arg: Option<&Path>, config: &QueueConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DB_PATH_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.db_path {
        return path.clone();
    }

    default_db_path()
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lsq").join("config.toml"))
}

/// OS-dependent default database location
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lsq"))
        .unwrap_or_else(|| PathBuf::from("./lsq_data"))
        .join("queue.db")
}
