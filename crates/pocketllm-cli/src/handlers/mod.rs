//! Command handlers.
//!
//! Each handler takes the composed [`CliContext`](crate::CliContext) and
//! returns a [`CliError`](crate::CliError) the entry point maps to an exit
//! code.

pub mod config;
pub mod history;
pub mod import;
pub mod list;
pub mod paths;
pub mod remove;
pub mod settings;
pub mod validate;
pub mod verify;
