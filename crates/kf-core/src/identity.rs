//! Identity keys for forwards
//!
//! The key is the join between configuration identity and runtime identity:
//! two profiles with the same key are the same forward, whatever their other
//! fields say.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::Profile;

/// Stable identifier for a forward's runtime slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForwardKey(String);

impl ForwardKey {
    /// Get the raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ForwardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&Profile> for ForwardKey {
    fn from(profile: &Profile) -> Self {
        compute_key(profile)
    }
}

/// Derive the identity key for a profile
///
/// Named profiles are keyed by name alone; anonymous ones by resource,
/// namespace and port pair.
pub fn compute_key(profile: &Profile) -> ForwardKey {
    let name = profile.name.trim();
    if !name.is_empty() {
        return ForwardKey(format!("name:{}", name));
    }

    ForwardKey(format!(
        "res:{}|ns:{}|{}:{}",
        profile.resource, profile.namespace, profile.local_port, profile.remote_port
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_key_ignores_other_fields() {
        let a = Profile::new("svc/api", 8080, 80).with_name("api");
        let b = Profile::new("svc/other", 9090, 90)
            .with_name("api")
            .with_namespace("prod");
        assert_eq!(compute_key(&a).as_str(), "name:api");
        assert_eq!(compute_key(&a), compute_key(&b));
    }

    #[test]
    fn test_anonymous_key_uses_resource_namespace_ports() {
        let profile = Profile::new("svc/api", 8080, 80).with_namespace("web");
        assert_eq!(compute_key(&profile).as_str(), "res:svc/api|ns:web|8080:80");
    }

    #[test]
    fn test_whitespace_name_is_anonymous() {
        let profile = Profile::new("svc/api", 8080, 80).with_name("   ");
        assert_eq!(compute_key(&profile).as_str(), "res:svc/api|ns:default|8080:80");
    }

    #[test]
    fn test_anonymous_keys_differ_by_port() {
        let a = Profile::new("svc/api", 8080, 80);
        let b = Profile::new("svc/api", 8081, 80);
        assert_ne!(compute_key(&a), compute_key(&b));
    }

    #[test]
    fn test_key_ignores_non_identity_fields() {
        let a = Profile::new("svc/api", 8080, 80);
        let b = Profile::new("svc/api", 8080, 80)
            .with_context("staging")
            .with_local_address("0.0.0.0")
            .with_auto_start(true)
            .with_auto_reconnect(false);
        assert_eq!(ForwardKey::from(&a), ForwardKey::from(&b));
    }
}
