// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `simrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "simrunner",
    version,
    about = "Run graphs of simulations and analysis functions locally or on PBS/SLURM.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Simrunner.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Simrunner.toml")]
    pub config: String,

    /// Restart every batch run from its previous output.
    #[arg(long)]
    pub restart_all: bool,

    /// Submit runs even if an identical run is already recorded.
    #[arg(long)]
    pub force: bool,

    /// Stop at the first failing node.
    #[arg(long)]
    pub raise_errors: bool,

    /// Override `[config].wait_interval` (e.g. "500ms", "10s").
    #[arg(long, value_name = "DURATION")]
    pub wait_interval: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SIMRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the run graph, but submit nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
