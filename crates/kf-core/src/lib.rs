//! kf-core: Profiles, identity keys and configuration for k-forward
//!
//! This crate provides the declarative side of the system: forwarding
//! profiles and their validation, the identity key that ties a profile to
//! its runtime record, the settings and profile-file loaders, and the log
//! sink used by the supervisor for human-readable trace output.

pub mod config;
pub mod error;
pub mod identity;
pub mod log_sink;
pub mod profile;
pub mod time;

pub use error::KfError;
pub use identity::{compute_key, ForwardKey};
pub use log_sink::LogSink;
pub use profile::{normalize, normalize_all, Profile, ProfileSet, ValidationError};
