//! `pocketllm` command-line interface.
//!
//! Catalog management over the same services the app uses: import, list,
//! remove, integrity checks, metadata history and settings.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;
// Used by the binary
use tokio as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, bootstrap};
pub use commands::{Commands, ConfigCommand, SettingsCommand};
pub use error::CliError;
pub use parser::Cli;
