//! kf-cli: Command-line interface for k-forward
//!
//! Provides the `k-forward` CLI: a foreground supervisor with an
//! interactive console, a profile checker and settings helpers.

pub mod commands;
pub mod console;
pub mod output;
