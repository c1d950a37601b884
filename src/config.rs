/// Viewer configuration
///
/// Stored as JSON next to the other per-user settings. Every field has a
/// default, so a partial file only overrides what it names.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    /// How long a resolved sample stays cached
    pub cache_validity_ms: u64,
    /// Quiet interval before a scrubbed step is fetched
    pub debounce_ms: u64,
    /// Step list polling interval while a run is in progress
    pub poll_interval_ms: u64,
    /// Scale samples up to fill the chart instead of only shrinking them
    pub fit: bool,
    /// Poll step lists on startup
    pub running: bool,
    /// Last imported log directory
    pub logdir: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_validity_ms: 5 * 60 * 1000,
            debounce_ms: 500,
            poll_interval_ms: 15_000,
            fit: false,
            running: false,
            logdir: None,
        }
    }
}

impl ViewerConfig {
    /// ~/.config/sample-viewer/config.json on Linux
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("sample-viewer");
        path.push("config.json");
        Ok(path)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn cache_validity(&self) -> Duration {
        Duration::from_millis(self.cache_validity_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.cache_validity(), Duration::from_secs(300));
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(!config.running);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"debounce_ms": 250, "fit": true}"#).unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert!(config.fit);
        assert_eq!(config.cache_validity_ms, 300_000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ViewerConfig {
            running: true,
            logdir: Some(PathBuf::from("/runs")),
            ..ViewerConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
