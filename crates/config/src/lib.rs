//! Configuration loading for the tempmail relay
//!
//! Provides utilities for loading configuration files from the shared
//! relay config directory (~/.config/tempmail-relay/).
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Initialize the relay config directory.
///
/// Creates ~/.config/tempmail-relay/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Get the relay config directory (~/.config/tempmail-relay/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tempmail-relay"))
}

/// Get the path to a config file within the relay config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the relay config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the relay config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("tempmail-relay"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("test.json");
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("tempmail-relay/test.json"));
    }

    #[test]
    fn test_load_json_file() {
        #[derive(serde::Deserialize)]
        struct Sample {
            name: String,
        }

        let path = std::env::temp_dir().join("tempmail-relay-load-test.json");
        std::fs::write(&path, r#"{ "name": "x" }"#).unwrap();
        let sample: Sample = load_json_file(&path).unwrap();
        assert_eq!(sample.name, "x");
        std::fs::remove_file(&path).ok();

        let missing = std::env::temp_dir().join("tempmail-relay-missing.json");
        assert!(load_json_file::<Sample>(&missing).is_err());
    }
}
