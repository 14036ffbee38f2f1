//! Ingestion configuration.
//!
//! Loaded from an optional JSON file; every field has a default so an
//! empty object (or no file at all) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::DEFAULT_ARCHIVE_SUBDIR;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the ingestion loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory scanned for `*.rcd` files.
    pub input_dir: PathBuf,
    /// Where committed files are moved. Defaults to
    /// `<input_dir>/parsedRecordFiles`.
    pub archive_dir: Option<PathBuf>,
    /// SQLite database holding records and the cursor.
    pub database: PathBuf,
    /// Presence of this file stops the loop at the next file boundary.
    pub stop_file: PathBuf,
    /// Idle time between scans, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./recordstreams"),
            archive_dir: None,
            database: PathBuf::from("recordstream.db"),
            stop_file: PathBuf::from("./stop"),
            poll_interval_ms: 1_000,
        }
    }
}

impl IngestConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Archive directory with the default applied.
    pub fn resolved_archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join(DEFAULT_ARCHIVE_SUBDIR))
    }

    /// Idle time between scans.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: IngestConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(
            config.resolved_archive_dir(),
            PathBuf::from("./recordstreams/parsedRecordFiles")
        );
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "input_dir": "/data/in", "archive_dir": "/data/done", "poll_interval_ms": 250 }"#,
        )
        .unwrap();

        let config = IngestConfig::load(&path).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.resolved_archive_dir(), PathBuf::from("/data/done"));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.stop_file, PathBuf::from("./stop"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "inputdir": "/data/in" }"#).unwrap();

        assert!(matches!(
            IngestConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            IngestConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
