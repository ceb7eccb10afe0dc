//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ags", version, about = "Automated glucose control loop")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ags_config.toml")]
    pub config: PathBuf,

    /// Emit cycle results, logs and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduled control loop against the configured collaborators
    Run {
        /// Run a single cycle and exit
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "max_cycles")]
        once: bool,
        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
    },
    /// Feed recorded acquisition rows through the loop back-to-back
    Replay {
        /// Headerless CSV in the acquisition record layout
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
    /// Validate the config and check that collaborator programs exist
    SelfCheck,
}
