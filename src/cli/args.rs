//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::domain::Tunable;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// NVML-based GPU telemetry and tuning tool
///
/// Read GPU telemetry and adjust power limit, clock offsets and the core
/// clock lock.
#[derive(Parser, Debug)]
#[command(name = "nvtune")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "NVTUNE_CONFIG")]
    pub config: Option<String>,

    /// Path to the tuning store
    #[arg(long, global = true, env = "NVTUNE_STORE")]
    pub store: Option<PathBuf>,

    /// Target GPU by index (0-based)
    #[arg(long, global = true)]
    pub gpu: Option<u32>,

    /// Target GPU by UUID
    #[arg(long, global = true)]
    pub gpu_uuid: Option<String>,

    /// Dry run mode - validate but don't apply changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all detected GPUs
    List,

    /// Show telemetry and tunable state
    Status(StatusArgs),

    /// Set a tunable (pl, gpu_co, mem_co, gpu_cl)
    Set(SetArgs),

    /// Restore a tunable to its default
    Reset(ResetArgs),

    /// Save current tunables to the tuning store
    Save,

    /// Apply tunables from the tuning store
    Apply,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Keep polling at the configured interval
    #[arg(short, long)]
    pub watch: bool,

    /// Poll interval in milliseconds (overrides config)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Arguments for the set command
#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Tunable to change
    pub tunable: Tunable,

    /// New value: watts for pl, MHz otherwise
    #[arg(allow_hyphen_values = true)]
    pub value: String,

    /// Also record the new value in the tuning store
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the reset command
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Tunable to reset
    pub tunable: Tunable,

    /// Also drop the value from the tuning store
    #[arg(long)]
    pub save: bool,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
