//! Supervisor settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_millis;

/// Settings for the forward supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Profiles file to reconcile against
    pub profiles_path: PathBuf,

    /// Program used to create forwards
    pub kubectl_path: String,

    /// Optional file that receives the forward log in addition to tracing
    pub log_file: Option<PathBuf>,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profiles_path: super::default_profiles_path(),
            kubectl_path: "kubectl".to_string(),
            log_file: None,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential backoff configuration
///
/// The delay before reconnect attempt `n` is `initial * 2^(n-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt
    #[serde(rename = "initial_ms", with = "duration_millis")]
    pub initial: Duration,

    /// Upper bound for any delay
    #[serde(rename = "max_ms", with = "duration_millis")]
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            kubectl_path = "/opt/kubectl"

            [backoff]
            max_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(settings.kubectl_path, "/opt/kubectl");
        assert_eq!(settings.backoff.initial, Duration::from_secs(1));
        assert_eq!(settings.backoff.max, Duration::from_secs(10));
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn test_default_backoff() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.initial, Duration::from_millis(1000));
        assert_eq!(backoff.max, Duration::from_millis(30_000));
    }
}
