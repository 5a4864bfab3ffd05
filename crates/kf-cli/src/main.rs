//! k-forward CLI
//!
//! Keeps `kubectl port-forward` processes alive:
//! - `run` supervises the forwards in a profiles file (the default)
//! - `check` validates a profiles file
//! - `config` manages the settings file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use k_forward::commands::{self, RunOptions};

#[derive(Parser)]
#[command(name = "k-forward")]
#[command(author, version, about = "Keeps kubectl port-forwards running")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true, env = "K_FORWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise port-forwards in the foreground (default)
    Run {
        /// Profiles file (overrides settings)
        #[arg(short, long)]
        profiles: Option<PathBuf>,
        /// kubectl binary to run (overrides settings)
        #[arg(long)]
        kubectl: Option<String>,
        /// Also append the forward log to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Don't read console commands from stdin
        #[arg(long)]
        no_console: bool,
    },

    /// Validate a profiles file and show the commands it would run
    Check {
        /// Profiles file (overrides settings)
        #[arg(short, long)]
        profiles: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings
    Show,
    /// Show settings and profiles file paths
    Path,
    /// Write default settings and a sample profiles file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity; forward log lines show at info
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn,forward=info",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let command = cli.command.unwrap_or(Commands::Run {
        profiles: None,
        kubectl: None,
        log_file: None,
        no_console: false,
    });

    match command {
        Commands::Run {
            profiles,
            kubectl,
            log_file,
            no_console,
        } => {
            let mut settings = commands::load_settings(cli.config.as_ref())?;
            if let Some(profiles) = profiles {
                settings.profiles_path = profiles;
            }
            if let Some(kubectl) = kubectl {
                settings.kubectl_path = kubectl;
            }
            if log_file.is_some() {
                settings.log_file = log_file;
            }

            commands::run_command(
                settings,
                RunOptions {
                    console: !no_console,
                },
            )
            .await?;
        }

        Commands::Check { profiles, json } => {
            let settings = commands::load_settings(cli.config.as_ref())?;
            let path = profiles.unwrap_or(settings.profiles_path);
            commands::check_command(&path, &settings.kubectl_path, json)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(cli.config.as_ref())?;
            }
            ConfigAction::Path => {
                commands::config_path(cli.config.as_ref())?;
            }
            ConfigAction::Init { force } => {
                commands::config_init(cli.config.as_ref(), force)?;
            }
        },
    }

    Ok(())
}
