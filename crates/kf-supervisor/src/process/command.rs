//! Argument vectors for port-forward processes

use kf_core::Profile;

/// Program and arguments for one forwarding process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Build the launch spec for `profile` using `program` (usually `kubectl`)
    pub fn for_profile(program: impl Into<String>, profile: &Profile) -> Self {
        Self {
            program: program.into(),
            args: forward_args(profile),
        }
    }

    /// Shell-like rendering for logs; arguments with spaces are quoted
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Arguments for `kubectl port-forward`
///
/// `[--context C] [-n NS] port-forward RESOURCE LOCAL:REMOTE [--address ADDR]`,
/// where each flag is present only when its field is non-empty.
pub fn forward_args(profile: &Profile) -> Vec<String> {
    let mut args = Vec::with_capacity(9);

    if !profile.context.is_empty() {
        args.push("--context".to_string());
        args.push(profile.context.clone());
    }
    if !profile.namespace.is_empty() {
        args.push("-n".to_string());
        args.push(profile.namespace.clone());
    }

    args.push("port-forward".to_string());
    args.push(profile.resource.clone());
    args.push(profile.port_pair());

    if !profile.local_address.is_empty() {
        args.push("--address".to_string());
        args.push(profile.local_address.clone());
    }

    args
}
