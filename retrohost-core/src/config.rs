//! Adapter configuration.
//!
//! Usually deserialized from a JSON file by the frontend; every field has a default so partial
//! files work.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Handed to the core through `GET_SYSTEM_DIRECTORY` (BIOS files and the like).
    pub system_directory: PathBuf,

    /// Handed to the core through `GET_SAVE_DIRECTORY`; SRAM files are written here too.
    pub save_directory: PathBuf,

    /// Flush battery-backed memory to disk on unload.
    pub autosave_sram: bool,

    /// Forward the core's own log output to the `log` facade.
    pub log_core_messages: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            system_directory: PathBuf::from("system"),
            save_directory: PathBuf::from("saves"),
            autosave_sram: true,
            log_core_messages: true,
        }
    }
}

impl AdapterConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, anyhow::Error> {
        serde_json::from_str(text).context("invalid adapter configuration")
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AdapterConfig::from_json(r#"{ "save_directory": "/tmp/saves" }"#).unwrap();
        assert_eq!(config.save_directory, PathBuf::from("/tmp/saves"));
        assert_eq!(config.system_directory, PathBuf::from("system"));
        assert!(config.autosave_sram);
        assert!(config.log_core_messages);
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = AdapterConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("invalid adapter configuration"));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retrohost.json");
        std::fs::write(&path, r#"{ "autosave_sram": false }"#).unwrap();

        let config = AdapterConfig::from_json_file(&path).unwrap();
        assert!(!config.autosave_sram);

        assert!(AdapterConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
