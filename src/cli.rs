// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rulemake`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rulemake",
    version,
    about = "Build targets from pattern rules, modifiers and implicit dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Goals to build. Default: the first concrete rule of the rule file.
    #[arg(value_name = "GOAL")]
    pub goals: Vec<String>,

    /// Path to the rule file (TOML), relative to `--directory`.
    #[arg(short, long, value_name = "PATH", default_value = "Rulefile.toml")]
    pub file: PathBuf,

    /// Directory to look for the rule file in.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Maximum number of recipes run at once (overrides `[config].jobs`).
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print recipes instead of running them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RULEMAKE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print projects, variables and rules, then exit.
    #[arg(long)]
    pub print_rules: bool,
}

impl CliArgs {
    /// The rule file, with `--directory` applied.
    pub fn rules_path(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.join(&self.file),
            None => self.file.clone(),
        }
    }
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
