//! Profile reconciliation
//!
//! [`Supervisor::sync_profiles`] brings the record set in line with a fresh
//! profile list. [`Reconciler`] wraps a [`ProfileSource`] and performs the
//! full refresh: load, normalize, validate, sync.
//!
//! Reconciliation never touches a process that is already running for a key
//! that is still present. The record's profile is replaced, but the child
//! keeps the arguments it was started with until its next stop/start cycle.

use std::collections::HashSet;

use kf_core::config::ProfileSource;
use kf_core::error::ConfigError;
use kf_core::{compute_key, normalize_all, ForwardKey, Profile};

use crate::record::ForwardRecord;
use crate::supervisor::Supervisor;

impl Supervisor {
    /// Reconcile the record set against `profiles`
    ///
    /// Every listed profile gets a record carrying its latest definition and
    /// is started when it asks for `autoStart` and is not already wanted.
    /// Records whose key is no longer listed are stopped (if wanted) and
    /// removed. Invalid profiles are skipped.
    pub fn sync_profiles(&mut self, profiles: &[Profile]) {
        let mut seen: HashSet<ForwardKey> = HashSet::with_capacity(profiles.len());

        for profile in profiles {
            let profile = profile.normalized();
            if let Err(e) = profile.validate() {
                tracing::warn!("Skipping invalid profile {}: {}", profile.label(), e);
                continue;
            }

            let key = compute_key(&profile);
            seen.insert(key.clone());

            let record = self
                .records
                .entry(key.clone())
                .or_insert_with(|| ForwardRecord::new(key, profile.clone()));
            record.profile = profile.clone();

            if profile.auto_start && !record.desired {
                self.start(&profile);
            }
        }

        let removed: Vec<ForwardKey> = self
            .records
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        for key in removed {
            let desired = self.records.get(&key).map(|r| r.desired).unwrap_or(false);
            if desired {
                self.stop_key(&key, Some("profile removed"));
            }
            // Dropping the record cancels any pending restart.
            if let Some(record) = self.records.remove(&key) {
                tracing::debug!("Removed forward {}", record.profile.label());
            }
        }

        self.notify();
    }
}

/// Outcome of one [`Reconciler::refresh`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Profiles that passed validation
    pub active: usize,
    /// Profiles dropped as invalid
    pub skipped: usize,
}

/// Loads profiles from a source and syncs them into a supervisor
pub struct Reconciler {
    source: Box<dyn ProfileSource>,
    profiles: Vec<Profile>,
}

impl Reconciler {
    /// Create a reconciler; nothing is loaded until the first refresh
    pub fn new(source: Box<dyn ProfileSource>) -> Self {
        Self {
            source,
            profiles: Vec::new(),
        }
    }

    /// Description of the profile source
    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Valid profiles from the last successful refresh, in source order
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Find a profile by identity key, name or resource, in that order
    pub fn find(&self, target: &str) -> Option<&Profile> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }

        self.profiles
            .iter()
            .find(|p| compute_key(p).as_str() == target)
            .or_else(|| self.profiles.iter().find(|p| p.name == target))
            .or_else(|| self.profiles.iter().find(|p| p.resource == target))
    }

    /// Reload the source and sync the supervisor with it
    ///
    /// On a configuration error the supervisor and the cached profile list
    /// are left exactly as they were.
    pub fn refresh(&mut self, supervisor: &mut Supervisor) -> Result<RefreshReport, ConfigError> {
        let raw = match self.source.load() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Failed to load profiles from {}: {}", self.source.describe(), e);
                return Err(e);
            }
        };

        let set = normalize_all(&raw);
        for (profile, reason) in &set.rejected {
            tracing::debug!("Rejected profile {}: {}", profile.label(), reason);
        }
        if !set.rejected.is_empty() {
            tracing::warn!(
                "Skipped {} invalid profile(s) from {}",
                set.rejected.len(),
                self.source.describe()
            );
        }

        let report = RefreshReport {
            active: set.valid.len(),
            skipped: set.rejected.len(),
        };

        supervisor.sync_profiles(&set.valid);
        self.profiles = set.valid;

        tracing::info!(
            "Loaded {} profile(s) from {}",
            report.active,
            self.source.describe()
        );
        Ok(report)
    }
}
