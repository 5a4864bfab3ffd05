//! Profile sources
//!
//! A profile source yields the raw, ordered profile list. Entries are left
//! loosely typed here; normalization and validation happen in the
//! reconciler so that a single bad entry never fails the whole load.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Example profiles file written by `k-forward config init`
pub const SAMPLE_PROFILES: &str = r#"# k-forward profiles
#
# Each [[forwards]] table describes one `kubectl port-forward`.
# Forwards with a name are identified by it; unnamed forwards are
# identified by resource, namespace and port pair.

[[forwards]]
name = "api"
namespace = "default"
resource = "svc/api"
localPort = 8080
remotePort = 80
autoStart = false
autoReconnect = true

# [[forwards]]
# context = "staging"
# namespace = "data"
# resource = "svc/postgres"
# localPort = 5432
# remotePort = 5432
# localAddress = "127.0.0.1"
# autoStart = true
"#;

/// Supplier of raw forwarding profiles
pub trait ProfileSource: Send {
    /// Load the current ordered list of raw profile entries
    fn load(&self) -> Result<Vec<Value>, ConfigError>;

    /// Short description for log messages
    fn describe(&self) -> String;
}

/// On-disk profile file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    /// `[[forwards]]` tables
    Toml,
    /// A bare array, or an object with a `forwards` array
    Json,
}

impl ProfileFormat {
    /// Pick the format from a file extension; anything but `.json` is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ProfileFormat::Json,
            _ => ProfileFormat::Toml,
        }
    }
}

/// Profile source backed by a TOML or JSON file
#[derive(Debug, Clone)]
pub struct FileProfileSource {
    path: PathBuf,
    format: ProfileFormat,
}

impl FileProfileSource {
    /// Create a source for `path`, detecting the format from its extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ProfileFormat::from_path(&path);
        Self { path, format }
    }

    /// Path of the profiles file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileSource for FileProfileSource {
    fn load(&self) -> Result<Vec<Value>, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Read {
            path: self.path.clone(),
            source: e,
        })?;

        let profiles = parse_profiles(&content, self.format)?;
        tracing::debug!("Loaded {} profile entries from {:?}", profiles.len(), self.path);
        Ok(profiles)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse the raw profile entries out of a profiles document
pub fn parse_profiles(content: &str, format: ProfileFormat) -> Result<Vec<Value>, ConfigError> {
    let document: Value = match format {
        ProfileFormat::Toml => {
            let table: toml::Table = toml::from_str(content)?;
            serde_json::to_value(table)?
        }
        ProfileFormat::Json => {
            if content.trim().is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(content)?
        }
    };

    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("forwards") {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => Err(ConfigError::Invalid(
                "`forwards` must be a list of profiles".to_string(),
            )),
            None => Ok(Vec::new()),
        },
        _ => Err(ConfigError::Invalid(
            "expected a list of profiles or a `forwards` list".to_string(),
        )),
    }
}
