//! Subcommand definitions.

use clap::Subcommand;
use std::path::PathBuf;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show resolved data, database and models paths
    Paths,

    /// Import a GGUF file into the managed models directory
    Import {
        /// Path of the file to import
        file_path: PathBuf,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Owner recorded as the model's creator
        #[arg(long, default_value = "local")]
        owner: String,
        /// Model architecture (e.g. "llama")
        #[arg(long)]
        architecture: Option<String>,
        /// Quantization type (e.g. "Q4_K_M")
        #[arg(long)]
        quantization: Option<String>,
        /// Native context length of the model
        #[arg(long)]
        context_length: Option<u64>,
    },

    /// List imported models
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Remove a model and delete its file
    Remove {
        /// Model name
        name: String,
    },

    /// Check every catalog entry for corrupt filenames
    Validate,

    /// Check model files on disk without loading them
    Verify {
        /// Model name (all models when omitted)
        name: Option<String>,
    },

    /// Show the metadata history of a model
    History {
        /// Model name
        name: String,
    },

    /// Per-model generation settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Global runtime configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Per-model settings commands.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show a model's stored settings
    Show {
        /// Model name
        name: String,
    },
    /// Update a model's settings
    Set {
        /// Model name
        name: String,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        top_p: Option<f32>,
        #[arg(long)]
        top_k: Option<i32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        repeat_penalty: Option<f32>,
        /// CPU threads used by the native engine
        #[arg(long)]
        threads: Option<u32>,
        /// Context length requested at load time
        #[arg(long)]
        context_length: Option<u64>,
    },
}

/// Global configuration commands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the stored configuration and the resolved runtime policy
    Show,
    /// Update global configuration
    Set {
        /// Token silence (ms) that ends a generation with partial output
        #[arg(long)]
        idle_timeout_ms: Option<u64>,
        /// Time (ms) without any token after which a generation fails
        #[arg(long)]
        hard_timeout_ms: Option<u64>,
        /// Time (ms) given to a native cancel
        #[arg(long)]
        stop_grace_ms: Option<u64>,
        /// Retry hint (ms) attached to busy rejections
        #[arg(long)]
        busy_retry_after_ms: Option<u64>,
        /// Consecutive failed loads before a model is refused
        #[arg(long)]
        max_load_failures: Option<u32>,
        /// Smallest file accepted as a model
        #[arg(long)]
        min_model_size_bytes: Option<u64>,
        /// Default context size (512-1000000)
        #[arg(long)]
        default_context_size: Option<u64>,
        /// Delete model files that fail the integrity check
        #[arg(long)]
        remove_corrupt_files: Option<bool>,
    },
}
