//! Engine configuration.
//!
//! Everything here flows through explicit constructor parameters — there is
//! no process-wide static configuration (spec design note: "no shared
//! mutable globals").

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{EngineError, Result};

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_flutter_path() -> String {
    "flutter".to_string()
}

/// Configuration for a single engine run, optionally loaded from
/// `scenectl.toml` in the current directory.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Path to the `adb` executable.
    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Path to the UI-framework CLI (first-on-PATH if not overridden).
    #[serde(default = "default_flutter_path")]
    pub flutter_path: String,

    /// Working directory for the spawned session child process.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for the spawned session child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            flutter_path: default_flutter_path(),
            working_directory: None,
            env: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load from `scenectl.toml` in the current directory, falling back to
    /// defaults if the file is absent.
    pub fn load() -> Result<Self> {
        let path = std::env::current_dir()
            .map_err(EngineError::Io)?
            .join("scenectl.toml");
        if path.exists() {
            return Self::load_from_path(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(EngineError::Io)?;
        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_path_lookup() {
        let config = EngineConfig::default();
        assert_eq!(config.adb_path, "adb");
        assert_eq!(config.flutter_path, "flutter");
        assert!(config.working_directory.is_none());
    }

    #[test]
    fn load_from_path_parses_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenectl.toml");
        std::fs::write(&path, "adb_path = \"/opt/android/adb\"\n").unwrap();

        let config = EngineConfig::load_from_path(&path).unwrap();
        assert_eq!(config.adb_path, "/opt/android/adb");
        assert_eq!(config.flutter_path, "flutter");
    }
}
