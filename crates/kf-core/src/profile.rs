//! Forwarding profiles
//!
//! A [`Profile`] is the declarative description of one desired forward.
//! Profiles arrive from the configuration source as loosely typed values and
//! are coerced into shape by [`normalize`]; only profiles that pass
//! [`Profile::validate`] are ever handed to the supervisor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Namespace used when a profile leaves it empty
pub const DEFAULT_NAMESPACE: &str = "default";

/// Highest port number a forward can bind or target
const MAX_PORT: i64 = 65535;

/// Declarative description of one port forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display label; also the identity when non-empty
    pub name: String,
    /// Cluster context passed to `--context`
    pub context: String,
    /// Namespace of the target resource
    pub namespace: String,
    /// Target resource, e.g. `svc/api` or `pod/web-0`
    pub resource: String,
    /// Local port to listen on
    pub local_port: i64,
    /// Port on the remote resource
    pub remote_port: i64,
    /// Local bind address passed to `--address`
    pub local_address: String,
    /// Start this forward whenever the profile list is reconciled
    pub auto_start: bool,
    /// Restart the forward when it exits while still desired
    pub auto_reconnect: bool,
}

/// Reasons a profile is not runnable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The resource field is empty
    #[error("resource is required")]
    MissingResource,

    /// The local port is missing or out of range
    #[error("localPort must be a port number between 1 and 65535 (got {0})")]
    InvalidLocalPort(i64),

    /// The remote port is missing or out of range
    #[error("remotePort must be a port number between 1 and 65535 (got {0})")]
    InvalidRemotePort(i64),
}

impl Profile {
    /// Create a profile for `resource` with the given port pair and defaults elsewhere
    pub fn new(resource: impl Into<String>, local_port: u16, remote_port: u16) -> Self {
        Self {
            name: String::new(),
            context: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            resource: resource.into(),
            local_port: i64::from(local_port),
            remote_port: i64::from(remote_port),
            local_address: String::new(),
            auto_start: false,
            auto_reconnect: true,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the cluster context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the local bind address
    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = address.into();
        self
    }

    /// Set the auto-start flag
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the auto-reconnect flag
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Check that the profile can be turned into a running forward
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.resource.trim().is_empty() {
            return Err(ValidationError::MissingResource);
        }
        if !is_port(self.local_port) {
            return Err(ValidationError::InvalidLocalPort(self.local_port));
        }
        if !is_port(self.remote_port) {
            return Err(ValidationError::InvalidRemotePort(self.remote_port));
        }
        Ok(())
    }

    /// Copy with strings trimmed and an empty namespace set to `default`
    ///
    /// Profiles built in code get the same shape [`normalize`] gives loaded
    /// ones, so both map to the same key and command line.
    pub fn normalized(&self) -> Profile {
        let namespace = self.namespace.trim();
        Profile {
            name: self.name.trim().to_string(),
            context: self.context.trim().to_string(),
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace.to_string()
            },
            resource: self.resource.trim().to_string(),
            local_address: self.local_address.trim().to_string(),
            ..self.clone()
        }
    }

    /// Whether [`Profile::validate`] succeeds
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Human-readable label: the name if set, otherwise resource and ports
    pub fn label(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            format!("{} {}", self.resource, self.port_pair())
        } else {
            name.to_string()
        }
    }

    /// The `local:remote` port pair as passed to port-forward
    pub fn port_pair(&self) -> String {
        format!("{}:{}", self.local_port, self.remote_port)
    }
}

fn is_port(port: i64) -> bool {
    (1..=MAX_PORT).contains(&port)
}

/// Coerce a loosely typed profile value into a [`Profile`]
///
/// Field names are accepted in both `camelCase` and `snake_case`. Missing or
/// mistyped strings become empty, ports that are not whole numbers become 0,
/// `autoReconnect` is on unless explicitly turned off. Never fails; use
/// [`Profile::validate`] on the result.
pub fn normalize(raw: &Value) -> Profile {
    let namespace = string_field(raw, &["namespace"]);

    Profile {
        name: string_field(raw, &["name"]),
        context: string_field(raw, &["context"]),
        namespace: if namespace.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            namespace
        },
        resource: string_field(raw, &["resource"]),
        local_port: port_field(raw, &["localPort", "local_port"]),
        remote_port: port_field(raw, &["remotePort", "remote_port"]),
        local_address: string_field(raw, &["localAddress", "local_address"]),
        auto_start: bool_field(raw, &["autoStart", "auto_start"]).unwrap_or(false),
        auto_reconnect: bool_field(raw, &["autoReconnect", "auto_reconnect"]).unwrap_or(true),
    }
}

/// Result of normalizing a whole profile list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
    /// Profiles that passed validation, in source order
    pub valid: Vec<Profile>,
    /// Profiles that did not, with the reason
    pub rejected: Vec<(Profile, ValidationError)>,
}

/// Normalize and validate every raw profile, keeping the source order
pub fn normalize_all(raw: &[Value]) -> ProfileSet {
    let mut set = ProfileSet::default();
    for value in raw {
        let profile = normalize(value);
        match profile.validate() {
            Ok(()) => set.valid.push(profile),
            Err(e) => set.rejected.push((profile, e)),
        }
    }
    set
}

fn field<'a>(raw: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| raw.get(*name))
        .filter(|v| !v.is_null())
}

fn string_field(raw: &Value, names: &[&str]) -> String {
    match field(raw, names) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn port_field(raw: &Value, names: &[&str]) -> i64 {
    let number = match field(raw, names) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n.fract() == 0.0 => n as i64,
        _ => 0,
    }
}

fn bool_field(raw: &Value, names: &[&str]) -> Option<bool> {
    match field(raw, names)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" | "off" => Some(false),
            _ => Some(true),
        },
        _ => None,
    }
}
