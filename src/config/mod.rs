//! Configuration system
//!
//! Application settings come from a TOML file merged with CLI arguments.
//! Per-device tunable values live separately in the JSON tuning store.

pub mod builder;
pub mod file;
pub mod store;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;
pub use store::{GpuSettings, TuningStore};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// GPU selection settings
    pub gpu: GpuConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
    /// Validate and report changes without applying them
    pub dry_run: bool,
    /// Telemetry poll interval in milliseconds
    pub interval_ms: u64,
    /// Tuning store location; defaults to the user config directory
    pub store_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            dry_run: false,
            interval_ms: 1000,
            store_path: None,
        }
    }
}

impl GeneralConfig {
    /// Poll interval, never shorter than 100ms
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(100))
    }

    /// Effective tuning store path
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(TuningStore::default_path)
    }
}

/// GPU selection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GpuConfig {
    /// Target GPU by index
    pub index: Option<u32>,
    /// Target GPU by UUID
    pub uuid: Option<String>,
}
