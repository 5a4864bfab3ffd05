//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_info, print_success, print_warning};
use kf_core::config::{self, Settings, SAMPLE_PROFILES};
use kf_core::error::ConfigError;

fn settings_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

/// Load settings from the settings file
///
/// A missing default settings file yields the default settings; a settings
/// file given explicitly must exist. A relative `profiles_path` is resolved
/// against the settings file's directory.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<Settings> {
    let path = settings_path(config_path);

    let mut settings = match config::load_config::<Settings>(&path) {
        Ok(settings) => {
            tracing::debug!("Loaded settings from {:?}", path);
            settings
        }
        Err(ConfigError::NotFound(_)) if config_path.is_none() => {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Settings::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load settings from {:?}", path));
        }
    };

    if settings.profiles_path.is_relative() {
        if let Some(dir) = path.parent() {
            settings.profiles_path = dir.join(&settings.profiles_path);
        }
    }

    Ok(settings)
}

/// Print the settings and profiles file locations
pub fn config_path(config_path: Option<&PathBuf>) -> Result<()> {
    let path = settings_path(config_path);
    let profiles = if path.exists() {
        load_settings(Some(&path))?.profiles_path
    } else {
        Settings::default().profiles_path
    };

    println!("settings: {}", path.display());
    println!("profiles: {}", profiles.display());
    Ok(())
}

/// Show the current settings file, or the defaults if there is none
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = settings_path(config_path);

    if !path.exists() {
        print_warning(&format!("No settings file found at {:?}", path));
        print_info("Run 'k-forward config init' to create one. Defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&Settings::default())?);
        return Ok(());
    }

    print_info(&format!("Settings file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read settings file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write default settings and a sample profiles file
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let config_file = settings_path(config_path);
    let config_dir = config_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_dir);

    if config_file.exists() && !force {
        anyhow::bail!(
            "Settings file already exists: {:?} (use --force to overwrite)",
            config_file
        );
    }

    let settings = Settings {
        profiles_path: config_dir.join("forwards.toml"),
        ..Settings::default()
    };
    config::save_config(&config_file, &settings)
        .with_context(|| format!("Failed to write settings file: {:?}", config_file))?;
    print_success(&format!("Created settings file: {:?}", config_file));

    if settings.profiles_path.exists() {
        print_info(&format!(
            "Keeping existing profiles file: {:?}",
            settings.profiles_path
        ));
    } else {
        std::fs::write(&settings.profiles_path, SAMPLE_PROFILES).with_context(|| {
            format!("Failed to write profiles file: {:?}", settings.profiles_path)
        })?;
        print_success(&format!(
            "Created profiles file: {:?}",
            settings.profiles_path
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_settings_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(load_settings(Some(&path)).is_err());
    }

    #[test]
    fn test_relative_profiles_path_resolves_next_to_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "profiles_path = \"team/forwards.json\"\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(
            settings.profiles_path,
            dir.path().join("team").join("forwards.json")
        );
        assert_eq!(settings.kubectl_path, "kubectl");
    }

    #[test]
    fn test_init_writes_settings_and_sample_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config_init(Some(&path), false).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.profiles_path, dir.path().join("forwards.toml"));
        let sample = std::fs::read_to_string(dir.path().join("forwards.toml")).unwrap();
        assert_eq!(sample, SAMPLE_PROFILES);
    }

    #[test]
    fn test_init_refuses_existing_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "kubectl_path = \"/opt/kubectl\"\n").unwrap();

        let err = config_init(Some(&path), false).unwrap_err();
        assert!(err.to_string().contains("use --force"));

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.kubectl_path, "/opt/kubectl");
        assert!(!dir.path().join("forwards.toml").exists());
    }

    #[test]
    fn test_init_force_overwrites_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "kubectl_path = \"/opt/kubectl\"\n").unwrap();

        config_init(Some(&path), true).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.kubectl_path, "kubectl");
    }
}
