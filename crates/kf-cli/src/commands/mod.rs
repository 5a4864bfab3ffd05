//! CLI command implementations

mod check;
mod config;
mod run;

pub use check::check_command;
pub use config::{config_init, config_path, config_show, load_settings};
pub use run::{run_command, RunOptions};
