// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `optask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "optask",
    version,
    about = "Run configured shell tasks and keep a history of their output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Optask.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OPTASK_LOG` directives or `warn` are used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List tasks with their latest run.
    Tasks,

    /// Start a run of a task and follow its output until it exits.
    Exec {
        /// Task id.
        task: String,
    },

    /// Show the run history of a task, newest first.
    History {
        /// Task id.
        task: String,

        /// Only list runs older than this run id.
        #[arg(long, value_name = "RUN")]
        before: Option<String>,

        /// Maximum number of runs to list.
        #[arg(long, default_value_t = 50)]
        count: usize,
    },

    /// Show the latest run of every task that ran at least once.
    Latest,

    /// Print the captured output of a run.
    Show {
        /// Task id.
        task: String,

        /// Run id.
        run: String,

        /// Skip this many lines.
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Print the incremental JSON form instead of plain text.
        #[arg(long)]
        json: bool,
    },
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
