//! CLI argument definitions.
//!
//! All Clap derive structs for `fencewatch` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Geofence enforcement daemon for RCON-managed game servers.
#[derive(Parser, Debug)]
#[command(name = "fencewatch", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as newline-delimited JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor the configured servers and enforce their fences.
    Run(RunArgs),

    /// Validate configuration files without connecting to any server.
    Validate(ValidateArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML configuration file.
    #[arg(
        short,
        long,
        default_value = "config.yml",
        env = "FENCEWATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Serve Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, env = "FENCEWATCH_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
