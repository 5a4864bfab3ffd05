//! Configuration management for k-forward

mod profiles;
pub mod serde_utils;
mod settings;

pub use profiles::{parse_profiles, FileProfileSource, ProfileFormat, ProfileSource, SAMPLE_PROFILES};
pub use settings::{BackoffConfig, Settings};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("k-forward")
}

/// Get the default settings file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default profiles file path
pub fn default_profiles_path() -> PathBuf {
    default_config_dir().join("forwards.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let result: Result<Settings, _> = load_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_then_load_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.kubectl_path = "/usr/local/bin/kubectl".to_string();
        save_config(&path, &settings).unwrap();

        let loaded: Settings = load_config(&path).unwrap();
        assert_eq!(loaded.kubectl_path, "/usr/local/bin/kubectl");
        assert_eq!(loaded.backoff, settings.backoff);
    }

    #[test]
    fn test_default_paths_share_directory() {
        assert_eq!(default_config_path().parent(), default_profiles_path().parent());
    }
}
