//! Output formatting utilities for the CLI
//!
//! Tables for forwards and profiles, and colored status messages.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use kf_core::time::{elapsed_millis, format_age};
use kf_core::{compute_key, Profile};
use kf_supervisor::process::LaunchSpec;
use kf_supervisor::{ForwardStatus, ForwardView};

/// Format forwards as an ASCII table
///
/// The detailed view adds the identity key, the process id and the last
/// exit.
pub fn format_views(views: &[ForwardView], detailed: bool) -> String {
    if views.is_empty() {
        return "No forwards configured".to_string();
    }

    #[derive(Tabled)]
    struct ForwardRow {
        #[tabled(rename = "NAME")]
        label: String,
        #[tabled(rename = "RESOURCE")]
        resource: String,
        #[tabled(rename = "PORTS")]
        ports: String,
        #[tabled(rename = "STATUS")]
        status: String,
    }

    #[derive(Tabled)]
    struct ForwardRowDetailed {
        #[tabled(rename = "KEY")]
        key: String,
        #[tabled(rename = "NAME")]
        label: String,
        #[tabled(rename = "TARGET")]
        target: String,
        #[tabled(rename = "PORTS")]
        ports: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "LAST EXIT")]
        last_exit: String,
    }

    if detailed {
        let rows: Vec<ForwardRowDetailed> = views
            .iter()
            .map(|v| ForwardRowDetailed {
                key: v.key.clone(),
                label: v.label.clone(),
                target: target(v),
                ports: ports(v),
                status: status_cell(v),
                pid: v
                    .pid
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                last_exit: last_exit_cell(v),
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(120))
            .to_string()
    } else {
        let rows: Vec<ForwardRow> = views
            .iter()
            .map(|v| ForwardRow {
                label: v.label.clone(),
                resource: v.resource.clone(),
                ports: ports(v),
                status: status_cell(v),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Format validated profiles with the command each one would run
pub fn format_profiles(profiles: &[Profile], program: &str) -> String {
    if profiles.is_empty() {
        return "No valid profiles".to_string();
    }

    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "KEY")]
        key: String,
        #[tabled(rename = "AUTO")]
        flags: String,
        #[tabled(rename = "COMMAND")]
        command: String,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .map(|p| ProfileRow {
            key: compute_key(p).to_string(),
            flags: flags(p.auto_start, p.auto_reconnect),
            command: LaunchSpec::for_profile(program, p).command_line(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Status text, with the reconnect delay while restarting
pub fn status_cell(view: &ForwardView) -> String {
    match (view.status, view.restart_in_ms) {
        (ForwardStatus::Restarting, Some(ms)) => {
            format!("restarting (attempt {}, in {}ms)", view.retry_count, ms)
        }
        (status, _) => status.to_string(),
    }
}

fn last_exit_cell(view: &ForwardView) -> String {
    match (&view.last_exit, view.last_exit_at) {
        (Some(exit), Some(at)) => format!("{}, {} ago", exit, format_age(elapsed_millis(at))),
        (Some(exit), None) => exit.clone(),
        _ => "-".to_string(),
    }
}

fn target(view: &ForwardView) -> String {
    let mut target = format!("{}/{}", view.namespace, view.resource);
    if !view.context.is_empty() {
        target = format!("{}:{}", view.context, target);
    }
    target
}

fn ports(view: &ForwardView) -> String {
    if view.local_address.is_empty() {
        view.ports.clone()
    } else {
        format!("{}:{}", view.local_address, view.ports)
    }
}

fn flags(auto_start: bool, auto_reconnect: bool) -> String {
    match (auto_start, auto_reconnect) {
        (true, true) => "start, reconnect",
        (true, false) => "start",
        (false, true) => "reconnect",
        (false, false) => "-",
    }
    .to_string()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix, to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow, to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(status: ForwardStatus) -> ForwardView {
        ForwardView {
            key: "name:api".to_string(),
            label: "api".to_string(),
            resource: "svc/api".to_string(),
            namespace: "default".to_string(),
            context: String::new(),
            ports: "8080:80".to_string(),
            local_address: String::new(),
            auto_start: false,
            auto_reconnect: true,
            status,
            desired: true,
            retry_count: 0,
            pid: None,
            last_exit: None,
            last_exit_at: None,
            restart_in_ms: None,
        }
    }

    #[test]
    fn test_empty_views() {
        assert_eq!(format_views(&[], false), "No forwards configured");
    }

    #[test]
    fn test_views_table_contains_rows() {
        let table = format_views(&[view(ForwardStatus::Running)], false);
        assert!(table.contains("api"));
        assert!(table.contains("8080:80"));
        assert!(table.contains("running"));
    }

    #[test]
    fn test_restarting_status_shows_delay() {
        let mut v = view(ForwardStatus::Restarting);
        v.retry_count = 2;
        v.restart_in_ms = Some(2000);
        assert_eq!(status_cell(&v), "restarting (attempt 2, in 2000ms)");
    }

    #[test]
    fn test_detailed_view_shows_target_and_exit() {
        let mut v = view(ForwardStatus::Stopped);
        v.context = "staging".to_string();
        v.last_exit = Some("code 1".to_string());
        v.pid = Some(42);

        let table = format_views(&[v], true);
        assert!(table.contains("staging:default/svc/api"));
        assert!(table.contains("code 1"));
        assert!(table.contains("42"));
    }

    #[test]
    fn test_profiles_table_shows_command() {
        let profile = Profile::new("svc/api", 8080, 80).with_auto_start(true);
        let table = format_profiles(&[profile], "kubectl");
        assert!(table.contains("kubectl -n default port-forward svc/api 8080:80"));
        assert!(table.contains("start, reconnect"));
    }
}
