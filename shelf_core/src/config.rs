//! Configuration file support for the shelf service.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/shelf/config.toml`.

use crate::layout::{build_default_layout, validate_layout, SlotBinding};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default = "build_default_layout")]
    pub slots: Vec<SlotBinding>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            alerts: AlertConfig::default(),
            slots: build_default_layout(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
        }
    }
}

/// Dashboard alert thresholds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertConfig {
    /// Usage count at or above which a slot is flagged for maintenance
    #[serde(default = "default_maintenance_threshold")]
    pub maintenance_threshold: u32,

    /// Borrow duration after which a loan is flagged overdue
    #[serde(default = "default_overdue_seconds")]
    pub overdue_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            maintenance_threshold: default_maintenance_threshold(),
            overdue_seconds: default_overdue_seconds(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("shelf")
}

fn default_database_file() -> String {
    "smart_factory.db".into()
}

fn default_maintenance_threshold() -> u32 {
    5
}

fn default_overdue_seconds() -> u64 {
    15
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("shelf").join("config.toml")
    }

    /// Reject layouts the engine cannot process deterministically
    pub fn validate(&self) -> Result<()> {
        let errors = validate_layout(&self.slots);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data.data_dir.join(&self.data.database_file)
    }
}
