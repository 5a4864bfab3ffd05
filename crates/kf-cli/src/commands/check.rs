//! Check command implementation

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::output::{format_profiles, print_info, print_success, print_warning};
use kf_core::config::{FileProfileSource, ProfileSource};
use kf_core::{compute_key, normalize_all, Profile};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport<'a> {
    profiles: &'a [Profile],
    rejected: Vec<Rejected>,
}

#[derive(Serialize)]
struct Rejected {
    label: String,
    reason: String,
}

/// Load and validate a profiles file and show what would run
///
/// Fails only when the file cannot be loaded; invalid entries are reported.
pub fn check_command(profiles_path: &Path, program: &str, json: bool) -> Result<()> {
    let source = FileProfileSource::new(profiles_path);
    let raw = source
        .load()
        .with_context(|| format!("Failed to load profiles from {:?}", profiles_path))?;

    let set = normalize_all(&raw);

    if json {
        let report = CheckReport {
            profiles: &set.valid,
            rejected: set
                .rejected
                .iter()
                .map(|(p, e)| Rejected {
                    label: p.label(),
                    reason: e.to_string(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", format_profiles(&set.valid, program));

    for (profile, reason) in &set.rejected {
        print_warning(&format!("Skipping {}: {}", profile.label(), reason));
    }
    for key in duplicate_keys(&set.valid) {
        print_warning(&format!(
            "Several profiles share the key {}; the last one wins",
            key
        ));
    }

    if set.rejected.is_empty() {
        print_success(&format!("{} profile(s) valid", set.valid.len()));
    } else {
        print_info(&format!(
            "{} profile(s) valid, {} skipped",
            set.valid.len(),
            set.rejected.len()
        ));
    }

    Ok(())
}

fn duplicate_keys(profiles: &[Profile]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for profile in profiles {
        let key = compute_key(profile).to_string();
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(key);
        }
    }
    order
}
