// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `execloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execloop",
    version,
    about = "Run shell command tasks in a retry loop until all of them succeed.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Execloop.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the tasks, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore `[execloop].execution_timeout` and run until done or aborted.
    #[arg(long)]
    pub no_deadline: bool,
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
