//! Root CLI parser and global options.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Commands;

/// Manage the on-device model catalog.
#[derive(Parser)]
#[command(name = "pocketllm")]
#[command(about = "Manage the local GGUF model catalog")]
#[command(version)]
pub struct Cli {
    /// Override the managed models directory for this invocation
    #[arg(long = "models-dir", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
