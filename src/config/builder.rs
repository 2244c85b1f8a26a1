//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// An explicitly named file must exist and parse; default locations are
    /// best effort.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default(),
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.config.general.verbose = true;
        }
        self
    }

    /// Override with CLI dry-run flag
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        if dry_run {
            self.config.general.dry_run = true;
        }
        self
    }

    /// Override with CLI interval
    pub fn with_interval(mut self, interval_ms: Option<u64>) -> Self {
        if let Some(i) = interval_ms {
            self.config.general.interval_ms = i;
        }
        self
    }

    /// Override with CLI store path
    pub fn with_store_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config.general.store_path = Some(p);
        }
        self
    }

    /// Override with CLI GPU index
    pub fn with_gpu_index(mut self, index: Option<u32>) -> Self {
        if let Some(i) = index {
            self.config.gpu.index = Some(i);
        }
        self
    }

    /// Override with CLI GPU UUID
    pub fn with_gpu_uuid(mut self, uuid: Option<String>) -> Self {
        if let Some(u) = uuid {
            self.config.gpu.uuid = Some(u);
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build();
        assert!(!config.general.verbose);
        assert!(!config.general.dry_run);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_verbose(true)
            .with_dry_run(true)
            .with_interval(Some(500))
            .with_gpu_index(Some(1))
            .with_store_path(Some(PathBuf::from("/tmp/s.json")))
            .build();

        assert!(config.general.verbose);
        assert!(config.general.dry_run);
        assert_eq!(config.general.interval_ms, 500);
        assert_eq!(config.gpu.index, Some(1));
        assert_eq!(config.general.store_path(), PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\ndry_run = true\n\n[gpu]\nindex = 2").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = ConfigBuilder::new()
            .with_file(Some(&path))
            .unwrap()
            .with_dry_run(false)
            .with_gpu_index(Some(0))
            .build();

        assert!(config.general.dry_run);
        assert_eq!(config.gpu.index, Some(0));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(ConfigBuilder::new()
            .with_file(Some("/nonexistent/nvtune.toml"))
            .is_err());
    }
}
