//! Core error types for k-forward

use std::path::PathBuf;
use thiserror::Error;

use crate::profile::ValidationError;

/// Top-level error type for the k-forward ecosystem
#[derive(Error, Debug)]
pub enum KfError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Profile validation error
    #[error("Invalid profile: {0}")]
    Validation(#[from] ValidationError),

    /// Child process error
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors raised while creating or signalling a forwarding process
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The argument vector was empty
    #[error("Empty command")]
    EmptyCommand,

    /// The operating system refused to create the process
    #[error("Failed to spawn {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process could not be signalled
    #[error("Failed to terminate process {pid}: {source}")]
    Terminate {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_program() {
        let err = SpawnError::Launch {
            program: "kubectl".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert_eq!(err.to_string(), "Failed to spawn kubectl: No such file");
    }

    #[test]
    fn test_config_error_converts_into_kf_error() {
        let err: KfError = ConfigError::Invalid("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: Invalid config: bad");
    }
}
