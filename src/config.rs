//! Tuning knobs, loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQLite `synchronous` pragma level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Sync on every commit.
    Full,
    /// Sync at checkpoints only.
    Normal,
    /// Leave syncing to the OS.
    Off,
}

impl SyncMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Normal => "NORMAL",
            SyncMode::Off => "OFF",
        }
    }
}

/// Settings for the SQLite persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// How long a call waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Durability level.
    pub synchronous: SyncMode,
    /// Use write-ahead logging for file-backed databases.
    pub wal: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            synchronous: SyncMode::Full,
            wal: true,
        }
    }
}

impl PersistenceConfig {
    /// [`busy_timeout_ms`](Self::busy_timeout_ms) as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Store-wide tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default bound on the summed `1 - strength` distance of a shortest path.
    pub max_path_length: f64,
    /// Cap on neighborhood search results.
    pub max_search_results: usize,
    /// Default `limit` for label/property search.
    pub default_search_limit: usize,
    /// Pass cap for label propagation.
    pub max_label_propagation_iterations: usize,
    /// Pass cap for Louvain-style merging.
    pub max_louvain_passes: usize,
    /// Fraction of between-community strength subtracted from a move's gain.
    pub between_community_penalty: f64,
    /// Seed for label propagation ordering. `None` draws a fresh seed per run.
    pub community_seed: Option<u64>,
    /// SQLite settings.
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_path_length: 10.0,
            max_search_results: 100,
            default_search_limit: 10,
            max_label_propagation_iterations: 100,
            max_louvain_passes: 100,
            between_community_penalty: 0.1,
            community_seed: None,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Defaults with reproducible community detection.
    pub fn deterministic(seed: u64) -> Self {
        Self {
            community_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Parses TOML text; absent keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })
    }

    /// Reads a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// `associa/config.toml` under the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("associa").join("config.toml"))
    }
}

/// Failure to load a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The contents are not valid config TOML.
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        /// File that failed; `None` for in-memory text.
        path: Option<PathBuf>,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
max_path_length = 4.5
community_seed = 7

[persistence]
synchronous = "normal"
"#,
        )
        .unwrap();
        assert_eq!(config.max_path_length, 4.5);
        assert_eq!(config.community_seed, Some(7));
        assert_eq!(config.max_search_results, 100);
        assert_eq!(config.persistence.synchronous, SyncMode::Normal);
        assert_eq!(config.persistence.busy_timeout_ms, 5_000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "max_path_length = \"ten\"").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: Some(_), .. }));
    }
}
