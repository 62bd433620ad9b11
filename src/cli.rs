// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobwatch",
    version,
    about = "Launch jobs, watch them for unexpected death, retry failures and report failure patterns.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// A missing file means all defaults and no startup jobs.
    #[arg(long, value_name = "PATH", default_value = "Jobwatch.toml")]
    pub config: String,

    /// Exit once no job is running (retries included).
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the jobs, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Also log the statistics report every N seconds.
    #[arg(long, value_name = "N")]
    pub stats_interval_secs: Option<u64>,
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
