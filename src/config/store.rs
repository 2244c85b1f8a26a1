//! Persisted per-device tunable settings
//!
//! A JSON object keyed by device UUID. Power is stored in watts, everything
//! else in MHz; absent fields are left untouched on apply.

use crate::domain::Tunable;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Saved tunables of one device, in user units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSettings {
    /// Power limit in watts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pl: Option<i64>,
    /// Core clock offset in MHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_co: Option<i64>,
    /// Memory clock offset in MHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_co: Option<i64>,
    /// Core clock lock in MHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_cl: Option<i64>,
}

impl GpuSettings {
    pub fn get(&self, tunable: Tunable) -> Option<i64> {
        match tunable {
            Tunable::PowerLimit => self.pl,
            Tunable::CoreOffset => self.gpu_co,
            Tunable::MemoryOffset => self.mem_co,
            Tunable::CoreClockLock => self.gpu_cl,
        }
    }

    pub fn set(&mut self, tunable: Tunable, value: Option<i64>) {
        let slot = match tunable {
            Tunable::PowerLimit => &mut self.pl,
            Tunable::CoreOffset => &mut self.gpu_co,
            Tunable::MemoryOffset => &mut self.mem_co,
            Tunable::CoreClockLock => &mut self.gpu_cl,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        Tunable::ALL.iter().all(|t| self.get(*t).is_none())
    }
}

/// JSON file of [`GpuSettings`] keyed by device UUID
#[derive(Debug, Clone)]
pub struct TuningStore {
    path: PathBuf,
    settings: BTreeMap<String, GpuSettings>,
}

impl TuningStore {
    /// Create an empty store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: BTreeMap::new(),
        }
    }

    /// Open the store at `path`; a missing file yields an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut store = Self::new(path);

        let content = match fs::read_to_string(&store.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No tuning store at {}", store.path.display());
                return Ok(store);
            }
            Err(e) => return Err(store.io_error(e)),
        };

        store.settings = serde_json::from_str(&content)?;
        log::debug!(
            "Loaded settings for {} GPU(s) from {}",
            store.settings.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Write the store as pretty-printed JSON, creating parent directories
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        log::info!("Saved tuning store to {}", self.path.display());
        Ok(())
    }

    pub fn get(&self, uuid: &str) -> Option<&GpuSettings> {
        self.settings.get(uuid)
    }

    pub fn set(&mut self, uuid: impl Into<String>, settings: GpuSettings) {
        self.settings.insert(uuid.into(), settings);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Default store location under the user config directory
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("nvtune").join("settings.json"),
            None => PathBuf::from("settings.json"),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "GPU-a1b2c3d4-0000-4000-8000-000000000000";

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TuningStore::load(dir.path().join("settings.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.get(UUID).is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = TuningStore::new(&path);
        store.set(
            UUID,
            GpuSettings {
                pl: Some(350),
                gpu_co: Some(150),
                ..Default::default()
            },
        );
        store.save().unwrap();

        let reloaded = TuningStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let settings = reloaded.get(UUID).unwrap();
        assert_eq!(settings.pl, Some(350));
        assert_eq!(settings.gpu_co, Some(150));
        assert_eq!(settings.mem_co, None);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "GPU-1": { "pl": 300, "gpu_co": -50, "mem_co": 1000, "gpu_cl": 2400 } }"#,
        )
        .unwrap();

        let store = TuningStore::load(&path).unwrap();
        let settings = store.get("GPU-1").unwrap();
        assert_eq!(settings.get(Tunable::PowerLimit), Some(300));
        assert_eq!(settings.get(Tunable::CoreOffset), Some(-50));
        assert_eq!(settings.get(Tunable::MemoryOffset), Some(1000));
        assert_eq!(settings.get(Tunable::CoreClockLock), Some(2400));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TuningStore::load(&path),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_settings_accessors() {
        let mut settings = GpuSettings::default();
        assert!(settings.is_empty());
        settings.set(Tunable::CoreClockLock, Some(2100));
        assert_eq!(settings.gpu_cl, Some(2100));
        assert!(!settings.is_empty());
        assert_eq!(
            serde_json::to_string(&settings).unwrap(),
            r#"{"gpu_cl":2100}"#
        );
    }
}
